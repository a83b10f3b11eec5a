// Request/response relay between a page context and the broker; one id and one reply per request.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::errors::{WebGenError, WebGenResult};
use crate::page::PageContextId;
use crate::relay::messages::{CommandResponse, RelayRequest};

/// Lifecycle of one relay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    AwaitingBrokerAck,
    AwaitingRemoteResult,
    Fulfilled,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Fulfilled | RequestState::Failed)
    }
}

/// In-flight requests by id. Entries leave once the caller has its answer.
#[derive(Debug, Default)]
pub struct RequestLedger {
    states: Mutex<HashMap<Uuid, RequestState>>,
}

impl RequestLedger {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, RequestState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set(&self, id: Uuid, state: RequestState) {
        let mut states = self.lock();
        if let Some(current) = states.get_mut(&id) {
            if current.is_terminal() {
                tracing::warn!(%id, from = ?current, to = ?state, "ignored transition out of a terminal state");
                return;
            }
            tracing::trace!(%id, from = ?current, to = ?state, "relay request transition");
            *current = state;
        }
    }

    fn open(&self, id: Uuid) {
        self.lock().insert(id, RequestState::Idle);
    }

    fn forget(&self, id: Uuid) {
        self.lock().remove(&id);
    }

    pub fn state(&self, id: Uuid) -> Option<RequestState> {
        self.lock().get(&id).copied()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }
}

/// One request as the broker receives it.
pub struct Envelope {
    pub id: Uuid,
    pub context: Option<PageContextId>,
    pub request: RelayRequest,
    pub responder: Responder,
}

/// The broker's half of a request. Must be consumed by [`Responder::respond`];
/// dropping it unanswered fails the request on the caller's side.
pub struct Responder {
    id: Uuid,
    reply: Option<oneshot::Sender<CommandResponse>>,
    ledger: Arc<RequestLedger>,
}

impl Responder {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Broker has taken the request and is contacting the interpreter.
    pub fn ack(&self) {
        self.ledger.set(self.id, RequestState::AwaitingRemoteResult);
    }

    /// Deliver the single reply and close the request.
    pub fn respond(mut self, response: CommandResponse) {
        let terminal = if response.is_error() {
            RequestState::Failed
        } else {
            RequestState::Fulfilled
        };
        self.ledger.set(self.id, terminal);

        if let Some(reply) = self.reply.take() {
            if reply.send(response).is_err() {
                tracing::debug!(id = %self.id, "late response discarded; caller stopped waiting");
            }
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.reply.is_some() {
            tracing::error!(id = %self.id, "relay request dropped without a response");
            self.ledger.set(self.id, RequestState::Failed);
        }
    }
}

/// Owned by the caller's future; the ledger entry goes away however that
/// future ends, including when it is dropped mid-flight.
struct LedgerEntry {
    ledger: Arc<RequestLedger>,
    id: Uuid,
}

impl Drop for LedgerEntry {
    fn drop(&mut self) {
        self.ledger.forget(self.id);
    }
}

/// Page-side handle. Cheap to clone; every clone shares the ledger.
#[derive(Clone)]
pub struct RelayClient {
    tx: mpsc::Sender<Envelope>,
    ledger: Arc<RequestLedger>,
    context: Option<PageContextId>,
}

/// Create a relay with room for `buffer` undelivered requests.
pub fn relay_channel(buffer: usize) -> (RelayClient, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(buffer);
    let client = RelayClient {
        tx,
        ledger: Arc::new(RequestLedger::default()),
        context: None,
    };
    (client, rx)
}

impl RelayClient {
    /// A client whose requests are attributed to `context`.
    pub fn for_context(&self, context: PageContextId) -> Self {
        Self {
            context: Some(context),
            ..self.clone()
        }
    }

    pub fn ledger(&self) -> &Arc<RequestLedger> {
        &self.ledger
    }

    /// Send `command` and wait for the broker's single reply.
    ///
    /// There is no timeout and no cancellation message: dropping the returned
    /// future abandons the request and its eventual reply is discarded.
    pub async fn send_command(&self, command: &str) -> WebGenResult<CommandResponse> {
        let id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.ledger.open(id);
        let _entry = LedgerEntry {
            ledger: Arc::clone(&self.ledger),
            id,
        };

        let envelope = Envelope {
            id,
            context: self.context,
            request: RelayRequest::ExecuteCommand {
                command: command.to_string(),
            },
            responder: Responder {
                id,
                reply: Some(reply_tx),
                ledger: Arc::clone(&self.ledger),
            },
        };

        // The broker may ack before `send` returns, so enter AwaitingBrokerAck first.
        self.ledger.set(id, RequestState::AwaitingBrokerAck);
        if let Err(returned) = self.tx.send(envelope).await {
            // Answer our own responder so its drop guard stays quiet.
            returned
                .0
                .responder
                .respond(CommandResponse::failure("broker unavailable"));
            return Err(WebGenError::ChannelProtocol(format!(
                "broker is not accepting requests (request {id})"
            )));
        }
        tracing::debug!(%id, context = ?self.context, "relay request sent");

        reply_rx.await.map_err(|_| {
            WebGenError::ChannelProtocol(format!("request {id} was closed without a response"))
        })
    }
}
