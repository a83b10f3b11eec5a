// Chat side of the relay: send the command, validate the returned actions, queue them.
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::action::parse_action_list;
use crate::errors::WebGenError;
use crate::executor::RunQueue;
use crate::relay::channel::RelayClient;
use crate::relay::messages::{CommandResponse, PageSignal};
use crate::relay::toggle::Overlay;

/// The single line shown to the user for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// The list was accepted and queued; carries its length.
    Executed(usize),
    NoActions,
    ConnectivityError,
    /// The interpreter returned a list that failed validation. Nothing ran.
    Rejected,
}

impl fmt::Display for ChatReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatReply::Executed(n) => write!(f, "Executed {n} actions."),
            ChatReply::NoActions => {
                f.write_str("I understood, but there were no actions to perform.")
            }
            ChatReply::ConnectivityError => {
                f.write_str("Sorry, I encountered an error connecting to the brain.")
            }
            ChatReply::Rejected => {
                f.write_str("Sorry, I received actions I could not perform on this page.")
            }
        }
    }
}

struct Processing<'a>(&'a AtomicBool);

impl Drop for Processing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct CommandSession {
    relay: RelayClient,
    queue: RunQueue,
    overlay: Overlay,
    processing: AtomicBool,
}

impl CommandSession {
    pub fn new(relay: RelayClient, queue: RunQueue) -> Self {
        Self {
            relay,
            queue,
            overlay: Overlay::new(),
            processing: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &RunQueue {
        &self.queue
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Start applying toolbar toggles to this session's overlay.
    pub fn follow_toggles(
        &self,
        signals: tokio::sync::broadcast::Receiver<PageSignal>,
    ) -> tokio::task::JoinHandle<()> {
        self.overlay.follow(signals)
    }

    /// Send one command and queue whatever comes back.
    ///
    /// Returns `None` without contacting the broker when the text is blank or
    /// another command from this session is still waiting for its reply. The
    /// queued actions run in the background; use [`Self::wait_idle`] to wait.
    pub async fn submit(&self, text: &str) -> Option<ChatReply> {
        if text.trim().is_empty() {
            return None;
        }
        if self.processing.swap(true, Ordering::SeqCst) {
            tracing::debug!("command ignored while another is in flight");
            return None;
        }
        let _processing = Processing(&self.processing);

        let reply = match self.relay.send_command(text).await {
            Ok(response) => self.accept(response),
            Err(e) => {
                tracing::error!(error = %e, "relay failed");
                ChatReply::ConnectivityError
            }
        };
        tracing::info!(reply = %reply, "command finished");
        Some(reply)
    }

    fn accept(&self, response: CommandResponse) -> ChatReply {
        if let Some(error) = &response.error {
            tracing::warn!(error = %error, "broker reported a failure");
            return ChatReply::ConnectivityError;
        }
        if let Some(interpretation) = response.interpretation() {
            tracing::info!(
                action = ?interpretation.action,
                target = ?interpretation.target,
                "interpreter understood"
            );
        }
        let Some(payload) = &response.actions else {
            return ChatReply::NoActions;
        };

        match parse_action_list(payload) {
            Ok(actions) if actions.is_empty() => ChatReply::NoActions,
            Ok(actions) => {
                let count = actions.len();
                // The report is only logged by the queue; nobody waits on it here.
                drop(self.queue.submit(actions));
                ChatReply::Executed(count)
            }
            Err(WebGenError::NotASequence(found)) => {
                tracing::warn!(found, "actions field is not a list");
                ChatReply::NoActions
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected action list");
                ChatReply::Rejected
            }
        }
    }

    /// Wait until every queued list has finished running.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }
}
