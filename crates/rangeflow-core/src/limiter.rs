//! Process-wide worker limit shared across downloads.
//!
//! Every download claims one unit before starting each fetch worker and returns
//! it when the worker exits, so the number of simultaneous range requests stays
//! bounded no matter how many downloads run at once.

use crate::error::DownloadError;
use std::sync::{Arc, Mutex, OnceLock};

/// Default process-wide cap when none is configured.
pub const DEFAULT_MAX_TOTAL_WORKERS: usize = 64;

/// Counting semaphore that fails fast instead of blocking.
#[derive(Debug)]
pub struct ConcurrencyLimit {
    max: usize,
    limit: Mutex<usize>,
}

impl ConcurrencyLimit {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            limit: Mutex::new(max),
        }
    }

    /// Lazily built instance shared by every `DownloaderConfig::default()`.
    pub fn process_default() -> Arc<ConcurrencyLimit> {
        static SHARED: OnceLock<Arc<ConcurrencyLimit>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| {
            Arc::new(ConcurrencyLimit::new(DEFAULT_MAX_TOTAL_WORKERS))
        }))
    }

    /// Take one unit. Never blocks; errors when none is left.
    pub fn sub(&self) -> Result<(), DownloadError> {
        let mut limit = self.lock();
        if *limit == 0 {
            return Err(DownloadError::ExceedMaxConcurrency);
        }
        *limit -= 1;
        Ok(())
    }

    /// Return one unit taken with `sub`.
    pub fn add(&self) {
        let mut limit = self.lock();
        *limit = (*limit + 1).min(self.max);
    }

    /// Units currently free.
    pub fn available(&self) -> usize {
        *self.lock()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        self.limit.lock().unwrap_or_else(|e| e.into_inner())
    }
}
