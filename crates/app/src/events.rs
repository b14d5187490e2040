use fincoach_chat::{ConversationKey, Turn};

/// Requests from the render surface into the coordinator.
///
/// Index-based commands refer to the conversation list as last published in
/// [`UiEvent::ConversationListChanged`]; the store defends against stale
/// indexes with an out-of-range notice instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send one user message into the active conversation, creating it
    /// when none is selected yet.
    Submit(String),
    NewConversation,
    Switch(usize),
    Delete(usize),
    Rename { index: usize, title: String },
    Login { uid: String, pass: String },
    Signup { uid: String, pass: String },
    Logout,
    Shutdown,
}

/// State notifications published to the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Sidebar contents: titles in list order plus the active pointer.
    ConversationListChanged {
        titles: Vec<String>,
        active: Option<usize>,
    },
    /// Snapshot of the active conversation's turns.
    ActiveTurnsChanged { turns: Vec<Turn> },
    /// Typing indicator for one conversation; set when a reply fetch starts,
    /// cleared exactly once when its reveal completes or the fetch fails.
    TypingChanged {
        conversation: ConversationKey,
        typing: bool,
    },
    SessionChanged { user_id: Option<String> },
    /// Non-fatal problem worth surfacing (rejected input, auth failure).
    Notice { message: String },
}
