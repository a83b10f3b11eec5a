// In-process document. Elements are rendered to HTML and matched with
// `scraper`, so selectors behave as in a browser; focus, value, outline and a
// journal of every mutation live beside the markup, keyed by node index.
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::errors::{WebGenError, WebGenResult};
use crate::page::traits::{DomEvent, Document, ElementRef};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryElement {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub value: String,
    pub outline: String,
    pub focused: bool,
    parent: Option<usize>,
    attached: bool,
}

impl MemoryElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attached: true,
            ..Default::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }
}

/// Side effects observed on the document, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum DomRecord {
    Outline { node: usize, outline: String },
    Click { node: usize },
    Focus { node: usize },
    SetValue { node: usize, value: String },
    Event { node: usize, event: DomEvent },
    Scroll { delta_y: f64, smooth: bool },
    Navigate { url: String },
}

#[derive(Debug)]
struct PageState {
    nodes: Vec<MemoryElement>,
    location: String,
    viewport_height: f64,
    scroll_y: f64,
    queries: Vec<String>,
    journal: Vec<DomRecord>,
}

pub struct MemoryDocument {
    state: Mutex<PageState>,
}

impl MemoryDocument {
    pub fn new(location: &str) -> Self {
        Self {
            state: Mutex::new(PageState {
                nodes: Vec::new(),
                location: location.to_string(),
                viewport_height: 800.0,
                scroll_y: 0.0,
                queries: Vec::new(),
                journal: Vec::new(),
            }),
        }
    }

    pub fn with_viewport_height(self, height: f64) -> Self {
        self.lock().viewport_height = height;
        self
    }

    /// Appends an element in document order and returns its node index.
    pub fn add(&self, element: MemoryElement) -> usize {
        let mut state = self.lock();
        state.nodes.push(element);
        state.nodes.len() - 1
    }

    /// Appends an element as the last child of `parent`. Children of void
    /// elements such as `input` are never rendered.
    pub fn add_within(&self, parent: usize, element: MemoryElement) -> usize {
        self.add(MemoryElement {
            parent: Some(parent),
            ..element
        })
    }

    /// Detaches a node and its subtree, as a host page re-render would.
    pub fn detach(&self, node: usize) {
        if let Some(el) = self.lock().nodes.get_mut(node) {
            el.attached = false;
        }
    }

    pub fn element(&self, node: usize) -> Option<MemoryElement> {
        self.lock().nodes.get(node).cloned()
    }

    pub fn elements(&self) -> Vec<MemoryElement> {
        self.lock().nodes.clone()
    }

    pub fn journal(&self) -> Vec<DomRecord> {
        self.lock().journal.clone()
    }

    /// Every selector passed to `query`, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    pub fn scroll_y(&self) -> f64 {
        self.lock().scroll_y
    }

    pub fn current_location(&self) -> String {
        self.lock().location.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// First attached node matching `selector` in document order. Invalid
    /// selectors match nothing.
    fn find(state: &PageState, selector: &str) -> Option<usize> {
        let selector = Selector::parse(selector).ok()?;
        let html = Html::parse_document(&render(state));
        let found = html
            .select(&selector)
            .find_map(|el| el.value().attr(NODE_ATTR).and_then(|n| n.parse().ok()));
        found
    }

    fn with_node<T>(
        &self,
        element: &ElementRef,
        op: impl FnOnce(&mut PageState, usize) -> T,
    ) -> WebGenResult<T> {
        let mut state = self.lock();
        let node = Self::find(&state, &element.selector).ok_or_else(|| {
            WebGenError::Page(format!(
                "element `{}` is no longer attached",
                element.selector
            ))
        })?;
        Ok(op(&mut state, node))
    }
}

#[async_trait]
impl Document for MemoryDocument {
    async fn query(&self, selector: &str) -> WebGenResult<Option<ElementRef>> {
        let mut state = self.lock();
        state.queries.push(selector.to_string());
        Ok(Self::find(&state, selector).map(|_| ElementRef::new(selector)))
    }

    async fn set_outline(&self, element: &ElementRef, outline: &str) -> WebGenResult<()> {
        self.with_node(element, |state, node| {
            state.nodes[node].outline = outline.to_string();
            state.journal.push(DomRecord::Outline {
                node,
                outline: outline.to_string(),
            });
        })
    }

    async fn click(&self, element: &ElementRef) -> WebGenResult<()> {
        self.with_node(element, |state, node| {
            state.journal.push(DomRecord::Click { node });
        })
    }

    async fn focus(&self, element: &ElementRef) -> WebGenResult<()> {
        self.with_node(element, |state, node| {
            for el in state.nodes.iter_mut() {
                el.focused = false;
            }
            state.nodes[node].focused = true;
            state.journal.push(DomRecord::Focus { node });
        })
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> WebGenResult<()> {
        self.with_node(element, |state, node| {
            state.nodes[node].value = value.to_string();
            state.journal.push(DomRecord::SetValue {
                node,
                value: value.to_string(),
            });
        })
    }

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> WebGenResult<()> {
        self.with_node(element, |state, node| {
            state.journal.push(DomRecord::Event { node, event });
        })
    }

    async fn location(&self) -> WebGenResult<String> {
        Ok(self.lock().location.clone())
    }

    async fn navigate(&self, url: &str) -> WebGenResult<()> {
        let mut state = self.lock();
        state.location = url.to_string();
        state.journal.push(DomRecord::Navigate {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn viewport_height(&self) -> WebGenResult<f64> {
        Ok(self.lock().viewport_height)
    }

    async fn scroll_by(&self, delta_y: f64, smooth: bool) -> WebGenResult<()> {
        let mut state = self.lock();
        state.scroll_y = (state.scroll_y + delta_y).max(0.0);
        state.journal.push(DomRecord::Scroll { delta_y, smooth });
        Ok(())
    }
}

const NODE_ATTR: &str = "data-webgen-node";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn render(state: &PageState) -> String {
    let mut markup = String::from("<!DOCTYPE html><html><head></head><body>");
    for (index, node) in state.nodes.iter().enumerate() {
        if node.parent.is_none() {
            render_node(state, index, &mut markup);
        }
    }
    markup.push_str("</body></html>");
    markup
}

fn render_node(state: &PageState, index: usize, out: &mut String) {
    let el = &state.nodes[index];
    if !el.attached {
        return;
    }

    out.push_str(&format!("<{} {NODE_ATTR}=\"{index}\"", el.tag));
    if let Some(id) = &el.id {
        out.push_str(&format!(" id=\"{}\"", escape_attr(id)));
    }
    if !el.classes.is_empty() {
        out.push_str(&format!(" class=\"{}\"", escape_attr(&el.classes.join(" "))));
    }
    for (name, value) in &el.attrs {
        out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
    }
    out.push('>');

    if VOID_TAGS.contains(&el.tag.as_str()) {
        return;
    }
    for (child, node) in state.nodes.iter().enumerate() {
        if node.parent == Some(index) {
            render_node(state, child, out);
        }
    }
    out.push_str(&format!("</{}>", el.tag));
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
