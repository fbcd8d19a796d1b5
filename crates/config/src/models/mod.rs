pub mod app_config;
pub mod logging;
pub mod tasks;
pub mod worker;

pub use app_config::*;
pub use logging::*;
pub use tasks::*;
pub use worker::*;
