use std::sync::Arc;

use tokio::sync::mpsc;

use crate::broker::interpreter::Interpreter;
use crate::broker::metrics::{MetricRecord, MetricsSink};
use crate::page::{PageContextId, PageRegistry};
use crate::relay::channel::Envelope;
use crate::relay::messages::{CommandRequest, CommandResponse, RelayRequest};
use crate::relay::toggle::ToggleBus;

/// Privileged intermediary between pages and the remote interpreter.
///
/// Each relay request is handled on its own task: one interpreter call, one
/// metric record and exactly one reply to the originating page.
pub struct CommandBroker {
    interpreter: Arc<dyn Interpreter>,
    pages: Arc<PageRegistry>,
    metrics: Arc<dyn MetricsSink>,
    user_id: Option<String>,
    toggles: ToggleBus,
}

impl CommandBroker {
    pub fn new(
        interpreter: Arc<dyn Interpreter>,
        pages: Arc<PageRegistry>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            interpreter,
            pages,
            metrics,
            user_id: None,
            toggles: ToggleBus::default(),
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn pages(&self) -> &Arc<PageRegistry> {
        &self.pages
    }

    /// Overlay toggle broadcast, fired from the toolbar action.
    pub fn toggles(&self) -> &ToggleBus {
        &self.toggles
    }

    /// Forward `command` to the interpreter once and record the outcome.
    ///
    /// Never fails: transport and decode problems come back as a response
    /// with `error` set and no actions.
    pub async fn handle(&self, command: &str, context: Option<PageContextId>) -> CommandResponse {
        let url = match context {
            Some(id) => self.pages.url_of(id).await.unwrap_or_default(),
            None => String::new(),
        };
        tracing::info!(command, url = %url, "forwarding command to interpreter");

        let request = CommandRequest {
            command: command.to_string(),
            url,
            user_id: self.user_id.clone(),
        };

        match self.interpreter.interpret(&request).await {
            Ok(response) => {
                self.record(command, true).await;
                response
            }
            Err(e) => {
                tracing::warn!(command, error = %e, "interpreter call failed");
                self.record(command, false).await;
                CommandResponse::failure(e.to_string())
            }
        }
    }

    async fn record(&self, command: &str, success: bool) {
        if let Err(e) = self.metrics.append(MetricRecord::now(command, success)).await {
            tracing::warn!(command, error = %e, "metric not recorded");
        }
    }

    /// Accept relay requests until every client handle is gone.
    pub async fn serve(self: Arc<Self>, mut requests: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = requests.recv().await {
            let broker = Arc::clone(&self);
            tokio::spawn(async move { broker.dispatch(envelope).await });
        }
        tracing::info!("relay closed, broker stopped");
    }

    async fn dispatch(&self, envelope: Envelope) {
        let Envelope {
            id,
            context,
            request,
            responder,
        } = envelope;
        responder.ack();

        let response = match request {
            RelayRequest::ExecuteCommand { command } => self.handle(&command, context).await,
        };
        tracing::debug!(%id, failed = response.is_error(), "replying to page");
        responder.respond(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::metrics::MemoryMetrics;
    use crate::errors::{WebGenError, WebGenResult};
    use crate::page::memory::MemoryDocument;
    use crate::relay::channel::relay_channel;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<CommandRequest>>,
    }

    #[async_trait]
    impl Interpreter for Recording {
        async fn interpret(&self, request: &CommandRequest) -> WebGenResult<CommandResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(CommandResponse {
                success: Some(true),
                actions: Some(json!([{"kind": "scroll", "direction": "down"}])),
                ..Default::default()
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl Interpreter for Unreachable {
        async fn interpret(&self, _request: &CommandRequest) -> WebGenResult<CommandResponse> {
            Err(WebGenError::Transport("connection refused".into()))
        }
    }

    fn broker(interpreter: Arc<dyn Interpreter>, metrics: Arc<MemoryMetrics>) -> CommandBroker {
        CommandBroker::new(interpreter, Arc::new(PageRegistry::new()), metrics)
    }

    #[tokio::test]
    async fn attaches_page_url_and_user() {
        let interpreter = Arc::new(Recording::default());
        let metrics = Arc::new(MemoryMetrics::new());
        let broker = broker(interpreter.clone(), metrics.clone()).with_user(Some("u-9".into()));
        let page = broker
            .pages()
            .register(Arc::new(MemoryDocument::new("https://shop.example/list")))
            .await;

        let response = broker.handle("Scroll down", Some(page)).await;
        assert!(!response.is_error());

        let seen = interpreter.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "https://shop.example/list");
        assert_eq!(seen[0].user_id.as_deref(), Some("u-9"));

        let records = metrics.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn unknown_page_sends_empty_url() {
        let interpreter = Arc::new(Recording::default());
        let broker = broker(interpreter.clone(), Arc::new(MemoryMetrics::new()));

        broker.handle("Scroll down", Some(PageContextId(42))).await;
        broker.handle("Scroll up", None).await;

        let seen = interpreter.seen.lock().unwrap().clone();
        assert!(seen.iter().all(|r| r.url.is_empty()));
    }

    #[tokio::test]
    async fn interpreter_failure_becomes_error_reply_and_failed_metric() {
        let metrics = Arc::new(MemoryMetrics::new());
        let broker = broker(Arc::new(Unreachable), metrics.clone());

        let response = broker.handle("Search for shoes", None).await;
        assert!(response.error.as_deref().unwrap().contains("connection refused"));
        assert!(response.actions.is_none());

        let records = metrics.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].command, "Search for shoes");
        assert!(!records[0].success);
    }

    #[tokio::test]
    async fn odd_interpretation_still_relays_actions() {
        use crate::broker::interpreter::HttpInterpreter;
        use axum::routing::post;
        use axum::{Json, Router};

        let app = Router::new().route(
            "/api/commands",
            post(|| async {
                Json(json!({
                    "actions": [{"kind": "scroll", "direction": "down"}],
                    "interpretation": {"target": {"kind": "page"}},
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let metrics = Arc::new(MemoryMetrics::new());
        let interpreter = Arc::new(HttpInterpreter::new(&format!("http://{addr}")));
        let broker = broker(interpreter, metrics.clone());

        let response = broker.handle("Scroll down", None).await;
        assert!(!response.is_error());
        assert!(response.actions.is_some());
        assert_eq!(response.interpretation().and_then(|i| i.action), None);

        let records = metrics.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
    }

    #[tokio::test]
    async fn serves_relay_requests_end_to_end() {
        let metrics = Arc::new(MemoryMetrics::new());
        let broker = Arc::new(broker(Arc::new(Recording::default()), metrics.clone()));
        let (client, rx) = relay_channel(8);
        tokio::spawn(Arc::clone(&broker).serve(rx));

        let (a, b) = tokio::join!(client.send_command("one"), client.send_command("two"));
        assert!(a.unwrap().actions.is_some());
        assert!(b.unwrap().actions.is_some());
        assert_eq!(metrics.records().len(), 2);
        assert_eq!(client.ledger().in_flight(), 0);
    }
}
