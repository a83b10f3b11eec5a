use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::relay::messages::PageSignal;

/// Broker-side broadcaster for presentation signals.
#[derive(Clone)]
pub struct ToggleBus {
    tx: broadcast::Sender<PageSignal>,
}

impl ToggleBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageSignal> {
        self.tx.subscribe()
    }

    /// Fire-and-forget; returns how many pages were listening.
    pub fn toggle(&self) -> usize {
        self.tx.send(PageSignal::ToggleOverlay).unwrap_or(0)
    }
}

impl Default for ToggleBus {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Collapsed/expanded state of the chat overlay on one page.
#[derive(Clone, Default)]
pub struct Overlay {
    collapsed: Arc<AtomicBool>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed.load(Ordering::SeqCst)
    }

    pub fn collapse(&self) {
        self.collapsed.store(true, Ordering::SeqCst);
    }

    pub fn expand(&self) {
        self.collapsed.store(false, Ordering::SeqCst);
    }

    pub fn toggle(&self) {
        self.collapsed.fetch_xor(true, Ordering::SeqCst);
    }

    /// Apply every signal from `rx` until the bus closes.
    pub fn follow(&self, mut rx: broadcast::Receiver<PageSignal>) -> JoinHandle<()> {
        let overlay = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PageSignal::ToggleOverlay) => overlay.toggle(),
                    // Every skipped signal was a toggle; only parity matters.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "overlay fell behind on toggle signals");
                        if skipped % 2 == 1 {
                            overlay.toggle();
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
