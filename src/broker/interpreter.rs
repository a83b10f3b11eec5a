use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::InterpreterConfig;
use crate::errors::{WebGenError, WebGenResult};
use crate::relay::messages::{CommandRequest, CommandResponse};

const COMMANDS_PATH: &str = "/api/commands";
const HISTORY_PATH: &str = "/api/commands/history";

/// The remote service that turns command text into an action list.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Exactly one attempt. Transport and decode failures are errors.
    async fn interpret(&self, request: &CommandRequest) -> WebGenResult<CommandResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: String,
    /// Opaque; the service has used both numeric and string ids.
    pub id: Value,
}

#[derive(Debug, Deserialize)]
struct HistoryReply {
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

pub struct HttpInterpreter {
    base_url: String,
    client: reqwest::Client,
}

impl HttpInterpreter {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(cfg: &InterpreterConfig) -> WebGenResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = cfg.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Past commands for `user_id`, newest first as the service returns them.
    pub async fn history(&self, user_id: &str) -> WebGenResult<Vec<HistoryEntry>> {
        let response = self
            .client
            .get(self.endpoint(HISTORY_PATH))
            .query(&[("userId", user_id)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WebGenError::Transport(format!("{status}: {body}")));
        }
        let reply: HistoryReply = response.json().await.map_err(transport)?;
        Ok(reply.history)
    }
}

#[async_trait]
impl Interpreter for HttpInterpreter {
    async fn interpret(&self, request: &CommandRequest) -> WebGenResult<CommandResponse> {
        tracing::debug!(
            endpoint = %self.endpoint(COMMANDS_PATH),
            command = %request.command,
            "sending interpreter request"
        );

        let response = self
            .client
            .post(self.endpoint(COMMANDS_PATH))
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        // Error statuses still carry a JSON body with an `error` field, which
        // is relayed like any other reply.
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        let reply: CommandResponse = serde_json::from_slice(&body).map_err(|e| {
            WebGenError::Transport(format!("undecodable interpreter reply ({status}): {e}"))
        })?;
        if !status.is_success() {
            tracing::warn!(%status, error = ?reply.error, "interpreter returned an error status");
        }
        Ok(reply)
    }
}

fn transport(e: reqwest::Error) -> WebGenError {
    WebGenError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route(
                "/api/commands",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "success": true,
                        "actions": [{"kind": "fill", "target": "input[type=search]", "value": "shoes"}],
                        "interpretation": {"action": "search", "target": body["url"]},
                    }))
                }),
            )
            .route(
                "/api/commands/history",
                get(|Query(query): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "history": [
                            {"command": "Search for shoes", "id": 2},
                            {"command": query.get("userId").cloned().unwrap_or_default(), "id": "1"},
                        ]
                    }))
                }),
            )
            .route("/broken/api/commands", post(|| async { "not json" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request(url: &str) -> CommandRequest {
        CommandRequest {
            command: "Search for shoes".into(),
            url: url.into(),
            user_id: Some("u-1".into()),
        }
    }

    #[tokio::test]
    async fn posts_command_and_decodes_reply() {
        let base = spawn_stub().await;
        let interpreter = HttpInterpreter::new(&format!("{base}/"));

        let reply = interpreter
            .interpret(&request("https://shop.example/"))
            .await
            .unwrap();
        assert_eq!(reply.success, Some(true));
        assert_eq!(
            reply.interpretation().and_then(|i| i.target).as_deref(),
            Some("https://shop.example/")
        );
        assert_eq!(reply.actions.unwrap().as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn fetches_history_for_user() {
        let base = spawn_stub().await;
        let interpreter = HttpInterpreter::new(&base);

        let history = interpreter.history("u-42").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].command, "u-42");
        assert_eq!(history[0].id, json!(2));
    }

    #[tokio::test]
    async fn undecodable_reply_is_a_transport_error() {
        let base = spawn_stub().await;
        let interpreter = HttpInterpreter::new(&format!("{base}/broken"));
        assert!(matches!(
            interpreter.interpret(&request("")).await,
            Err(WebGenError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let cfg = InterpreterConfig {
            base_url: format!("http://{addr}"),
            user_id: None,
            timeout_ms: Some(2_000),
        };
        let interpreter = HttpInterpreter::from_config(&cfg).unwrap();
        assert!(matches!(
            interpreter.interpret(&request("")).await,
            Err(WebGenError::Transport(_))
        ));
    }
}
