pub mod in_memory_queue;
pub mod simulated_device;
pub mod state_store;

pub use in_memory_queue::{QueueStats, TaskQueue};
pub use simulated_device::{DeviceCall, SimulatedDevice};
pub use state_store::JsonFileStateStore;
