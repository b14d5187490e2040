pub mod config;
pub mod events;
pub mod service;

pub use config::AppConfig;
pub use events::{Command, UiEvent};
pub use service::{ChatService, ServiceOptions};
