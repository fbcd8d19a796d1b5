pub mod components;
pub mod scheduler;
pub mod service;

pub use components::{CallbackOutcome, ExecutionReport, TaskExecutionManager, WorkerLifecycle};
pub use scheduler::TaskScheduler;
pub use service::{WorkerService, WorkerServiceBuilder, DEFAULT_POLL_INTERVAL_MS};
