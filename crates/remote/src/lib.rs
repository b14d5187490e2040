pub mod client;
pub mod error;
pub mod history;
pub mod video;
pub mod wire;

pub use client::{BackendConfig, CoachBackend, HttpBackend, Reply, SaveTurn};
pub use error::{BackendError, BackendResult};
pub use history::{RemoteConversation, RemoteExchange, group_history};
pub use video::normalize_video_link;
pub use wire::{CHAT_UID_UNSET, HistoryRow};
