pub mod app;
pub mod callbacks;

pub use app::Application;
