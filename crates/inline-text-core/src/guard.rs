//! "Do not recurse" scope guards.

use std::cell::Cell;
use std::rc::Rc;

/// Shared flag that marks a routine as running.
///
/// Cloning shares the flag. [`ReentrancyFlag::try_enter`] returns a guard
/// that clears the flag when dropped, on every exit path.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyFlag(Rc<Cell<bool>>);

impl ReentrancyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.0.get()
    }

    /// Enter the scope, or `None` if it is already held.
    #[must_use]
    pub fn try_enter(&self) -> Option<ReentrancyGuard> {
        if self.0.replace(true) {
            return None;
        }
        Some(ReentrancyGuard(Rc::clone(&self.0)))
    }
}

/// Held scope. Releases the flag on drop.
#[derive(Debug)]
pub struct ReentrancyGuard(Rc<Cell<bool>>);

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_enter_refused() {
        let flag = ReentrancyFlag::new();
        let guard = flag.try_enter();
        assert!(guard.is_some());
        assert!(flag.is_held());
        assert!(flag.try_enter().is_none());
        drop(guard);
        assert!(!flag.is_held());
        assert!(flag.try_enter().is_some());
    }

    #[test]
    fn test_released_on_early_return() {
        fn work(flag: &ReentrancyFlag, bail: bool) -> bool {
            let Some(_guard) = flag.try_enter() else {
                return false;
            };
            if bail {
                return false;
            }
            true
        }

        let flag = ReentrancyFlag::new();
        assert!(!work(&flag, true));
        assert!(!flag.is_held());
        assert!(work(&flag, false));
    }

    #[test]
    fn test_released_on_panic() {
        let flag = ReentrancyFlag::new();
        let inner = flag.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = inner.try_enter();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!flag.is_held());
    }
}
