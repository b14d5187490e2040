pub mod manager;
pub mod store;

pub use manager::{SESSION_TTL_MS, Session, SessionManager};
pub use store::{
    FileSessionStore, MemorySessionStore, PersistedSession, SessionError, SessionResult,
    SessionStore,
};
