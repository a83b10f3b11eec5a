pub mod interpreter;
pub mod metrics;
pub mod service;

pub use interpreter::{HistoryEntry, HttpInterpreter, Interpreter};
pub use metrics::{JsonlMetricsLog, MemoryMetrics, MetricRecord, MetricsSink};
pub use service::CommandBroker;
