use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{OrcError, Result};

/// Cooperative cancellation flag shared between a caller and a writer or
/// stripe iterator. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been raised
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(OrcError::Cancelled)
        } else {
            Ok(())
        }
    }
}
