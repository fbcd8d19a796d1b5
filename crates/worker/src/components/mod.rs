pub mod task_execution;
pub mod worker_lifecycle;

pub use task_execution::{CallbackOutcome, ExecutionReport, TaskExecutionManager};
pub use worker_lifecycle::WorkerLifecycle;
