//! Dense linear algebra used by correlation models.

use crate::types::NumericsError;

/// Lower-triangular Cholesky factor of a symmetric row-major `n × n` matrix.
///
/// Pivots smaller than `1e-12` are rejected.
///
/// # Errors
///
/// `NumericsError::NotPositiveDefinite` naming the failing row.
///
/// # Example
///
/// ```
/// use credit_core::math::linalg::cholesky;
///
/// let l = cholesky(&[1.0, 0.5, 0.5, 1.0], 2).unwrap();
/// assert!((l[2] - 0.5).abs() < 1e-15);
/// assert!((l[3] - 0.75_f64.sqrt()).abs() < 1e-15);
/// ```
pub fn cholesky(matrix: &[f64], n: usize) -> Result<Vec<f64>, NumericsError> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum();
            let value = matrix[i * n + j] - dot;
            if i == j {
                if value <= 1e-12 {
                    return Err(NumericsError::NotPositiveDefinite { row: i });
                }
                l[i * n + i] = value.sqrt();
            } else {
                l[i * n + j] = value / l[j * n + j];
            }
        }
    }
    Ok(l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstructs_matrix() {
        let m = [4.0, 2.0, 0.4, 2.0, 2.0, 0.5, 0.4, 0.5, 3.0];
        let l = cholesky(&m, 3).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let v: f64 = (0..3).map(|k| l[i * 3 + k] * l[j * 3 + k]).sum();
                assert!((v - m[i * 3 + j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_rejects_indefinite() {
        assert_eq!(
            cholesky(&[1.0, 1.0, 1.0, 1.0], 2),
            Err(NumericsError::NotPositiveDefinite { row: 1 })
        );
    }
}
