pub mod callbacks;
pub mod codec;
pub mod entities;
pub mod ports;

pub use callbacks::CallbackRegistry;
pub use codec::{decode_registers, decode_registers_named};
pub use entities::{DeviceOperation, PersistedTask, RegisterFormat, RegisterValue, Task};
pub use ports::{CallbackInvocation, DeviceTransport, StateStore, TaskCallback};
pub use scheduler_errors::{SchedulerError, SchedulerResult};
