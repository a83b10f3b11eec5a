pub mod engine;
pub mod queue;
pub mod tempo;

pub use engine::{ActionExecutor, ExecutionReport, Highlight};
pub use queue::RunQueue;
pub use tempo::Tempo;
