//! Engine cache state machine.
//!
//! ```text
//! Uninitialized --query--> Computed --mutation--> Stale --query--> Computed
//! ```
//!
//! Every mutator calls [`Cache::invalidate`]; the single recomputation entry
//! point calls [`Cache::store`]. There is no partial recomputation.

/// Lifecycle state of a cached computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing computed yet.
    Uninitialized,
    /// Cache matches the current inputs.
    Computed,
    /// Inputs changed since the last computation.
    Stale,
}

/// Cached value with an explicit state.
#[derive(Debug, Clone)]
pub struct Cache<T> {
    state: CacheState,
    value: Option<T>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self {
            state: CacheState::Uninitialized,
            value: None,
        }
    }
}

impl<T> Cache<T> {
    /// Current state.
    #[inline]
    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Whether a query can be answered without recomputation.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.state == CacheState::Computed
    }

    /// Mark the cache stale; an uninitialized cache stays uninitialized.
    pub fn invalidate(&mut self) {
        if self.state == CacheState::Computed {
            self.state = CacheState::Stale;
        }
        self.value = None;
    }

    /// Store a freshly computed value.
    pub fn store(&mut self, value: T) -> &T {
        self.state = CacheState::Computed;
        self.value.insert(value)
    }

    /// The cached value, computing and storing it first unless fresh.
    ///
    /// # Errors
    ///
    /// Whatever `compute` returns; the cache is left without a value.
    pub fn get_or_try_store<E>(&mut self, compute: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        let value = match self.value.take() {
            Some(v) if self.state == CacheState::Computed => v,
            _ => compute()?,
        };
        self.state = CacheState::Computed;
        Ok(self.value.insert(value))
    }

    /// The cached value, if fresh.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        match self.state {
            CacheState::Computed => self.value.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut cache: Cache<u32> = Cache::default();
        assert_eq!(cache.state(), CacheState::Uninitialized);
        cache.invalidate();
        assert_eq!(cache.state(), CacheState::Uninitialized);

        assert_eq!(*cache.store(7), 7);
        assert!(cache.is_fresh());
        assert_eq!(cache.get(), Some(&7));

        cache.invalidate();
        assert_eq!(cache.state(), CacheState::Stale);
        assert_eq!(cache.get(), None);

        cache.store(8);
        assert_eq!(cache.state(), CacheState::Computed);
    }

    #[test]
    fn test_get_or_try_store() {
        let mut cache: Cache<u32> = Cache::default();
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_try_store(|| {
                    calls += 1;
                    Ok::<_, ()>(calls)
                })
                .unwrap();
            assert_eq!(*v, 1);
        }
        cache.invalidate();
        assert!(cache.get_or_try_store(|| Err::<u32, _>("boom")).is_err());
        assert_eq!(cache.state(), CacheState::Stale);
        assert_eq!(*cache.get_or_try_store(|| Ok::<_, ()>(9)).unwrap(), 9);
    }
}
