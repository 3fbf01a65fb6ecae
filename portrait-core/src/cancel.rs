use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::debug;

use crate::error::{PortraitError, PortraitResult};

/// Cooperative cancellation flag checked by the pipeline between stages.
///
/// Clones share the same flag, so a UI thread can keep one clone and hand another to a worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Stages already running finish; the next check fails.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Fail with [`PortraitError::Cancelled`] if cancellation was requested.
    pub fn check(&self, stage: &'static str) -> PortraitResult<()> {
        if self.is_cancelled() {
            debug!("Cancellation observed before {stage}");
            Err(PortraitError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(worker.check("blur layers").is_ok());

        token.cancel();
        assert!(worker.is_cancelled());
        assert!(matches!(
            worker.check("composite"),
            Err(PortraitError::Cancelled { stage: "composite" })
        ));
    }
}
