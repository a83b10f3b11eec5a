use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::page::traits::Document;

/// Identifies the page a relay request originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageContextId(pub u32);

impl std::fmt::Display for PageContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Open pages known to the broker, keyed by context id.
#[derive(Default)]
pub struct PageRegistry {
    pages: RwLock<HashMap<PageContextId, Arc<dyn Document>>>,
    next_id: AtomicU32,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, document: Arc<dyn Document>) -> PageContextId {
        let id = PageContextId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.pages.write().await.insert(id, document);
        tracing::debug!(context = %id, "page registered");
        id
    }

    pub async fn remove(&self, id: PageContextId) {
        self.pages.write().await.remove(&id);
    }

    pub async fn get(&self, id: PageContextId) -> Option<Arc<dyn Document>> {
        self.pages.read().await.get(&id).cloned()
    }

    /// Best-effort URL lookup; unknown or unreachable pages yield `None`.
    pub async fn url_of(&self, id: PageContextId) -> Option<String> {
        let document = self.get(id).await?;
        match document.location().await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!(context = %id, error = %e, "page URL unavailable");
                None
            }
        }
    }
}
