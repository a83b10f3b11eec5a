use std::sync::Arc;

use serde_json::Value;

use crate::action::{parse_action_list, Action, ActionList};
use crate::config::AppConfig;
use crate::errors::{WebGenError, WebGenResult};
use crate::executor::tempo::Tempo;
use crate::page::{DomEvent, Document, ElementRef};
use crate::resolver::SelectorResolver;

/// Outline styles applied while an element is being acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub click: String,
    pub fill: String,
}

impl Default for Highlight {
    fn default() -> Self {
        Self {
            click: "2px solid red".to_string(),
            fill: "2px solid blue".to_string(),
        }
    }
}

/// What happened to one action list. Indices refer to positions in the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Actions that were started.
    pub attempted: usize,
    /// Actions whose target went through resolution, in order.
    pub resolutions: Vec<usize>,
    pub unresolved: Vec<usize>,
    /// Actions that hit a page error after resolution.
    pub failed: Vec<usize>,
    /// Set when a navigate action ended the page context.
    pub navigated: Option<String>,
}

impl ExecutionReport {
    pub fn completed(&self) -> usize {
        self.attempted - self.unresolved.len() - self.failed.len()
    }
}

enum Flow {
    Continue,
    Terminated,
}

/// Sequential interpreter for action lists against one document.
///
/// Actions run strictly one at a time. A target that does not resolve, or a
/// page error on one action, is logged and skipped; the rest of the list
/// still runs. Only a `navigate` stops the list early, because the page
/// context it runs in is gone.
///
/// There is no mutual exclusion here: two concurrent `execute` calls on the
/// same document interleave. Use [`RunQueue`](crate::executor::RunQueue) to
/// serialize lists.
pub struct ActionExecutor {
    document: Arc<dyn Document>,
    resolver: SelectorResolver,
    tempo: Tempo,
    highlight: Highlight,
    scroll_fraction: f64,
}

impl ActionExecutor {
    pub fn new(document: Arc<dyn Document>, resolver: SelectorResolver) -> Self {
        Self {
            document,
            resolver,
            tempo: Tempo::default(),
            highlight: Highlight::default(),
            scroll_fraction: 0.8,
        }
    }

    pub fn from_config(document: Arc<dyn Document>, cfg: &AppConfig) -> WebGenResult<Self> {
        Ok(Self {
            document,
            resolver: SelectorResolver::from_config(&cfg.resolver)?,
            tempo: Tempo::from_config(&cfg.executor),
            highlight: Highlight {
                click: cfg.executor.click_highlight.clone(),
                fill: cfg.executor.fill_highlight.clone(),
            },
            scroll_fraction: cfg.executor.scroll_fraction,
        })
    }

    pub fn with_tempo(mut self, tempo: Tempo) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }

    /// Validate an untyped payload, then run it. Nothing touches the page
    /// unless every action in the payload is well formed.
    pub async fn execute_payload(&self, payload: &Value) -> WebGenResult<ExecutionReport> {
        let actions = parse_action_list(payload)?;
        Ok(self.execute(&actions).await)
    }

    pub async fn execute(&self, actions: &ActionList) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        tracing::info!(count = actions.len(), "executing actions");

        for (index, action) in actions.iter().enumerate() {
            report.attempted += 1;
            tracing::debug!(index, kind = action.kind(), "running action");

            match self.run_action(index, action, &mut report).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Terminated) => {
                    tracing::info!(
                        index,
                        dropped = actions.len() - index - 1,
                        "navigation ended the page context"
                    );
                    return report;
                }
                Err(e) => {
                    tracing::warn!(index, kind = action.kind(), error = %e, "action failed");
                    report.failed.push(index);
                }
            }

            self.tempo.pace().await;
        }

        tracing::info!(
            attempted = report.attempted,
            completed = report.completed(),
            "action list finished"
        );
        report
    }

    async fn run_action(
        &self,
        index: usize,
        action: &Action,
        report: &mut ExecutionReport,
    ) -> WebGenResult<Flow> {
        match action {
            Action::Click { target } => {
                if let Some(element) = self.resolve_target(index, target, report).await? {
                    self.click(&element).await?;
                }
            }
            Action::Fill { target, value } => {
                if let Some(element) = self.resolve_target(index, target, report).await? {
                    self.fill(&element, value).await?;
                }
            }
            Action::Navigate { url } => {
                self.document.navigate(url).await?;
                report.navigated = Some(url.clone());
                return Ok(Flow::Terminated);
            }
            Action::Scroll { direction } => {
                let height = self.document.viewport_height().await?;
                let delta = height * self.scroll_fraction * direction.sign();
                self.document.scroll_by(delta, true).await?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn resolve_target(
        &self,
        index: usize,
        descriptor: &str,
        report: &mut ExecutionReport,
    ) -> WebGenResult<Option<ElementRef>> {
        report.resolutions.push(index);
        let found = self.resolver.resolve(self.document.as_ref(), descriptor).await?;
        if found.is_none() {
            let err = WebGenError::UnresolvedTarget {
                index,
                descriptor: descriptor.to_string(),
            };
            tracing::warn!(index, descriptor, "{err}");
            report.unresolved.push(index);
        }
        Ok(found)
    }

    async fn click(&self, element: &ElementRef) -> WebGenResult<()> {
        self.document
            .set_outline(element, &self.highlight.click)
            .await?;
        let outcome = self.activate(element).await;
        self.clear_highlight(element).await;
        outcome
    }

    async fn activate(&self, element: &ElementRef) -> WebGenResult<()> {
        self.tempo.settle().await;
        self.document.click(element).await
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> WebGenResult<()> {
        self.document
            .set_outline(element, &self.highlight.fill)
            .await?;
        let outcome = self.enter_value(element, value).await;
        self.clear_highlight(element).await;
        outcome
    }

    async fn enter_value(&self, element: &ElementRef, value: &str) -> WebGenResult<()> {
        self.tempo.settle().await;
        self.document.focus(element).await?;
        self.document.set_value(element, value).await?;
        for event in [DomEvent::Input, DomEvent::Change, DomEvent::EnterKeyDown] {
            self.document.dispatch(element, event).await?;
        }

        // The Enter key may already have submitted and started a navigation.
        if let Err(e) = self.submit_marketplace_search().await {
            tracing::debug!(error = %e, "marketplace submit skipped");
        }
        Ok(())
    }

    /// Some marketplaces ignore a synthetic Enter key; click their own
    /// submit control when the page is one of them.
    async fn submit_marketplace_search(&self) -> WebGenResult<()> {
        let location = self.document.location().await?;
        let Some(rule) = self.resolver.marketplace_for(&location) else {
            return Ok(());
        };
        if let Some(button) = self.document.query(&rule.submit_selector).await? {
            tracing::debug!(marketplace = %rule.name, "clicking marketplace search submit");
            self.document.click(&button).await?;
        }
        Ok(())
    }

    async fn clear_highlight(&self, element: &ElementRef) {
        if let Err(e) = self.document.set_outline(element, "").await {
            tracing::debug!(selector = %element.selector, error = %e, "highlight not cleared");
        }
    }
}
