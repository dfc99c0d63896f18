use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal shared between a job and whoever started it.
///
/// Pipelines call [`CancelFlag::check`] before every external call; work that already
/// completed stays committed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    stop: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: &'static str) -> anyhow::Result<()> {
        if self.is_cancelled() {
            return Err(Cancelled { stage }.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Cancelled {
    pub stage: &'static str,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled (stage={})", self.stage)
    }
}

impl std::error::Error for Cancelled {}

pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Cancelled>().is_some()
}
