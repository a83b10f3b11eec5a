use std::time::Duration;

use tokio::time::sleep;

use crate::config::ExecutorConfig;

/// Human-like cadence: a settle pause between highlighting an element and
/// acting on it, and a pacing pause after every action so the page's own
/// re-rendering can finish before the next lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tempo {
    pub settle: Duration,
    pub pacing: Duration,
}

impl Tempo {
    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        Self {
            settle: Duration::from_millis(cfg.settle_delay_ms),
            pacing: Duration::from_millis(cfg.pacing_delay_ms),
        }
    }

    /// No pauses at all; for offline runs against an in-process document.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            pacing: Duration::ZERO,
        }
    }

    pub async fn settle(&self) {
        if !self.settle.is_zero() {
            sleep(self.settle).await;
        }
    }

    pub async fn pace(&self) {
        if !self.pacing.is_zero() {
            sleep(self.pacing).await;
        }
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}
