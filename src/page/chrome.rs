// Chrome DevTools backend. Every DOM operation is a small script evaluated in
// the page, so element lookups always run against the current document.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;

use crate::config::BrowserConfig;
use crate::errors::{WebGenError, WebGenResult};
use crate::page::traits::{DomEvent, Document, ElementRef};

/// Browser connection plus the tab commands act on.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    /// Attach to a running Chrome on the debugging endpoint, or launch one.
    /// Blocking; call from `spawn_blocking`.
    pub fn attach_or_launch(cfg: &BrowserConfig) -> WebGenResult<Self> {
        if let Some(debug_url) = &cfg.debug_url {
            match Browser::connect(debug_url.clone()) {
                Ok(browser) => {
                    tracing::info!(url = %debug_url, "attached to running Chrome");
                    let existing = {
                        let tabs = browser
                            .get_tabs()
                            .lock()
                            .map_err(|_| WebGenError::Page("tab list lock poisoned".into()))?;
                        tabs.first().cloned()
                    };
                    let tab = match existing {
                        Some(tab) => tab,
                        None => browser.new_tab().map_err(page_err)?,
                    };
                    return Ok(Self {
                        _browser: browser,
                        tab,
                    });
                }
                Err(e) => {
                    tracing::warn!(url = %debug_url, error = %e, "attach failed; launching Chrome");
                }
            }
        }

        let options = LaunchOptions {
            headless: cfg.headless,
            idle_browser_timeout: Duration::from_secs(cfg.idle_timeout_secs),
            ..Default::default()
        };
        let browser = Browser::new(options).map_err(page_err)?;
        let tab = browser.new_tab().map_err(page_err)?;
        tracing::info!(headless = cfg.headless, "Chrome launched");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Load `url` in the session tab and wait for navigation to settle. Blocking.
    pub fn open(&self, url: &str) -> WebGenResult<()> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(page_err)?;
        Ok(())
    }

    pub fn document(&self) -> ChromeDocument {
        ChromeDocument::new(Arc::clone(&self.tab))
    }
}

pub struct ChromeDocument {
    tab: Arc<Tab>,
}

impl ChromeDocument {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    async fn evaluate(&self, script: String) -> WebGenResult<Value> {
        let tab = Arc::clone(&self.tab);
        let remote = tokio::task::spawn_blocking(move || tab.evaluate(&script, false))
            .await
            .map_err(|e| WebGenError::Page(format!("evaluation task failed: {e}")))?
            .map_err(page_err)?;
        Ok(remote.value.unwrap_or(Value::Null))
    }

    /// Runs `body` with `el` bound to a fresh lookup of the element. The body
    /// must return `true`; a `null` result means the element is gone.
    async fn on_element(&self, element: &ElementRef, body: &str) -> WebGenResult<()> {
        let selector = serde_json::to_string(&element.selector)?;
        let script = format!(
            "(() => {{ const el = document.querySelector({selector}); \
             if (!el) return null; {body} }})()"
        );
        match self.evaluate(script).await? {
            Value::Null => Err(WebGenError::Page(format!(
                "element `{}` is no longer attached",
                element.selector
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Document for ChromeDocument {
    async fn query(&self, selector: &str) -> WebGenResult<Option<ElementRef>> {
        let literal = serde_json::to_string(selector)?;
        let script = format!(
            "(() => {{ try {{ return document.querySelector({literal}) !== null; }} \
             catch (e) {{ return false; }} }})()"
        );
        let found = self.evaluate(script).await?.as_bool().unwrap_or(false);
        Ok(found.then(|| ElementRef::new(selector)))
    }

    async fn set_outline(&self, element: &ElementRef, outline: &str) -> WebGenResult<()> {
        let outline = serde_json::to_string(outline)?;
        self.on_element(element, &format!("el.style.outline = {outline}; return true;"))
            .await
    }

    async fn click(&self, element: &ElementRef) -> WebGenResult<()> {
        self.on_element(element, "el.click(); return true;").await
    }

    async fn focus(&self, element: &ElementRef) -> WebGenResult<()> {
        self.on_element(element, "el.focus(); return true;").await
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> WebGenResult<()> {
        let value = serde_json::to_string(value)?;
        self.on_element(element, &format!("el.value = {value}; return true;"))
            .await
    }

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> WebGenResult<()> {
        self.on_element(
            element,
            &format!("el.dispatchEvent({}); return true;", event.js_constructor()),
        )
        .await
    }

    async fn location(&self) -> WebGenResult<String> {
        let href = self.evaluate("window.location.href".to_string()).await?;
        href.as_str()
            .map(str::to_string)
            .ok_or_else(|| WebGenError::Page("location.href is not a string".into()))
    }

    async fn navigate(&self, url: &str) -> WebGenResult<()> {
        let url = serde_json::to_string(url)?;
        self.evaluate(format!(
            "(() => {{ window.location.href = {url}; return true; }})()"
        ))
        .await?;
        Ok(())
    }

    async fn viewport_height(&self) -> WebGenResult<f64> {
        self.evaluate("window.innerHeight".to_string())
            .await?
            .as_f64()
            .ok_or_else(|| WebGenError::Page("window.innerHeight is not a number".into()))
    }

    async fn scroll_by(&self, delta_y: f64, smooth: bool) -> WebGenResult<()> {
        let behavior = if smooth { "smooth" } else { "auto" };
        self.evaluate(format!(
            "(() => {{ window.scrollBy({{ top: {delta_y}, behavior: '{behavior}' }}); return true; }})()"
        ))
        .await?;
        Ok(())
    }
}

fn page_err(e: impl std::fmt::Display) -> WebGenError {
    WebGenError::Page(e.to_string())
}
