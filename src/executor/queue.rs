// Single-consumer run queue: action lists execute one after another instead of
// interleaving their DOM operations on the shared page.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{oneshot, Notify};

use crate::action::ActionList;
use crate::executor::engine::{ActionExecutor, ExecutionReport};

struct Job {
    actions: ActionList,
    done: oneshot::Sender<ExecutionReport>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    /// A pump task is alive.
    active: bool,
    /// A list is executing right now.
    running: bool,
}

struct Shared {
    executor: Arc<ActionExecutor>,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct RunQueue {
    shared: Arc<Shared>,
}

impl RunQueue {
    pub fn new(executor: Arc<ActionExecutor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueue a list. The returned receiver yields its report once it ran;
    /// dropping it does not cancel the run.
    pub fn submit(&self, actions: ActionList) -> oneshot::Receiver<ExecutionReport> {
        let (done, report) = oneshot::channel();
        let start_pump = {
            let mut state = self.shared.lock();
            state.pending.push_back(Job { actions, done });
            tracing::debug!(queued = state.pending.len(), active = state.active, "action list queued");
            if state.active {
                false
            } else {
                state.active = true;
                true
            }
        };

        if start_pump {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(pump(shared));
        }
        report
    }

    /// Number of lists waiting or running.
    pub fn len(&self) -> usize {
        let state = self.shared.lock();
        state.pending.len() + usize::from(state.running)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves once nothing is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

async fn pump(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(job) => {
                    state.running = true;
                    job
                }
                None => {
                    state.active = false;
                    drop(state);
                    shared.idle.notify_waiters();
                    return;
                }
            }
        };

        let report = shared.executor.execute(&job.actions).await;
        shared.lock().running = false;
        if job.done.send(report).is_err() {
            tracing::debug!("action list report discarded; submitter went away");
        }
    }
}
