use std::sync::{Mutex, PoisonError};

type Cleanup = Box<dyn FnOnce() + Send>;

/// Cleanups registered over a router's lifetime, run once on dispose.
pub struct Disposer {
    cleanups: Mutex<Option<Vec<Cleanup>>>,
}

impl Disposer {
    pub fn new() -> Self {
        Self {
            cleanups: Mutex::new(Some(Vec::new())),
        }
    }

    /// Registers a cleanup. After `dispose` has run, the cleanup runs immediately instead.
    pub fn register(&self, cleanup: impl FnOnce() + Send + 'static) {
        let mut guard = self.cleanups.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(cleanups) => cleanups.push(Box::new(cleanup)),
            None => {
                drop(guard);
                cleanup();
            }
        }
    }

    pub fn dispose(&self) {
        let cleanups = self
            .cleanups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Run outside the lock so a cleanup may register more work.
        for cleanup in cleanups.into_iter().flatten() {
            cleanup();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.cleanups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::new()
    }
}
