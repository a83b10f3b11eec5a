use async_trait::async_trait;

use crate::errors::WebGenResult;

/// A live element, identified by the selector that resolved it.
///
/// Backends re-query the selector on every operation, so a handle never pins
/// a node across suspension points. If the page re-renders in between, the
/// operation either hits the fresh node or fails with a page error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
}

impl ElementRef {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

/// Synthetic notifications dispatched on an element after a value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    EnterKeyDown,
}

impl DomEvent {
    /// JavaScript expression constructing the bubbling event.
    pub fn js_constructor(self) -> &'static str {
        match self {
            DomEvent::Input => "new Event('input', { bubbles: true })",
            DomEvent::Change => "new Event('change', { bubbles: true })",
            DomEvent::EnterKeyDown => {
                "new KeyboardEvent('keydown', { key: 'Enter', code: 'Enter', bubbles: true })"
            }
        }
    }
}

/// The page the engine acts on. Shared with the host page's own scripts, so
/// any call may observe a document that changed since the previous one.
#[async_trait]
pub trait Document: Send + Sync {
    /// Read-only lookup. Invalid selectors resolve to `None`.
    async fn query(&self, selector: &str) -> WebGenResult<Option<ElementRef>>;

    /// Sets the inline outline style; an empty string clears it.
    async fn set_outline(&self, element: &ElementRef, outline: &str) -> WebGenResult<()>;

    async fn click(&self, element: &ElementRef) -> WebGenResult<()>;

    async fn focus(&self, element: &ElementRef) -> WebGenResult<()>;

    async fn set_value(&self, element: &ElementRef, value: &str) -> WebGenResult<()>;

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> WebGenResult<()>;

    /// Current `location.href`.
    async fn location(&self) -> WebGenResult<String>;

    /// Assigns `location.href`. Ends the current page context.
    async fn navigate(&self, url: &str) -> WebGenResult<()>;

    async fn viewport_height(&self) -> WebGenResult<f64>;

    async fn scroll_by(&self, delta_y: f64, smooth: bool) -> WebGenResult<()>;
}
