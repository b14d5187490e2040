/// Stable local identifier for one conversation.
///
/// Minted by the store and never reused, so asynchronous writers can keep a
/// key across list mutations that would invalidate an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey(pub u64);

impl ConversationKey {
    /// Creates a typed conversation key.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Per-conversation identifier for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    /// Creates a typed turn identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Routing key for reveal writes.
///
/// Captured when the assistant placeholder is appended; every reveal event
/// carries it so a stream keeps writing into its own conversation even after
/// the active pointer moves elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevealTarget {
    pub conversation: ConversationKey,
    pub turn: TurnId,
}

impl RevealTarget {
    /// Builds a full reveal target from conversation and turn identifiers.
    pub const fn new(conversation: ConversationKey, turn: TurnId) -> Self {
        Self { conversation, turn }
    }
}

/// Server-side identity of a conversation.
///
/// Starts `Unset` and transitions exactly once to `Assigned` when the first
/// persist for the conversation succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RemoteId {
    #[default]
    Unset,
    Assigned(String),
}

impl RemoteId {
    /// Returns the assigned server id, if any.
    pub fn assigned(&self) -> Option<&str> {
        match self {
            Self::Assigned(id) => Some(id),
            Self::Unset => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// Chat speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Assistant,
}

/// One message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub id: TurnId,
    pub speaker: Speaker,
    pub text: String,
    pub video_link: Option<String>,
    pub video_revealed: bool,
}

impl Turn {
    /// Creates a completed user turn.
    pub fn user(id: TurnId, text: impl Into<String>) -> Self {
        Self {
            id,
            speaker: Speaker::User,
            text: text.into(),
            video_link: None,
            video_revealed: false,
        }
    }

    /// Creates an empty assistant placeholder that a reveal stream will fill.
    pub fn assistant_placeholder(id: TurnId, video_link: Option<String>) -> Self {
        Self {
            id,
            speaker: Speaker::Assistant,
            text: String::new(),
            video_link,
            video_revealed: false,
        }
    }

    /// Creates an assistant turn that is already fully revealed.
    pub fn assistant_revealed(
        id: TurnId,
        text: impl Into<String>,
        video_link: Option<String>,
    ) -> Self {
        Self {
            id,
            speaker: Speaker::Assistant,
            text: text.into(),
            video_link,
            video_revealed: true,
        }
    }
}

/// Conversation aggregate owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub key: ConversationKey,
    pub remote_id: RemoteId,
    pub title: String,
    pub turns: Vec<Turn>,
    next_turn_id: u64,
}

impl Conversation {
    /// Creates an empty conversation with a placeholder title.
    pub fn new(key: ConversationKey, title: impl Into<String>) -> Self {
        Self {
            key,
            remote_id: RemoteId::Unset,
            title: title.into(),
            turns: Vec::new(),
            next_turn_id: 1,
        }
    }

    /// Allocates the next turn identifier for this conversation.
    pub(crate) fn alloc_turn_id(&mut self) -> TurnId {
        let id = TurnId::new(self.next_turn_id);
        self.next_turn_id = self.next_turn_id.saturating_add(1);
        id
    }

    /// Returns the turn with the given id, if it still exists.
    pub fn turn(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    pub(crate) fn turn_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|turn| turn.id == id)
    }

    /// Returns true while no user turn has been appended yet.
    ///
    /// Seeded greeting turns do not count; the title is derived from the
    /// first message the user actually sends.
    pub fn awaiting_first_user_turn(&self) -> bool {
        self.turns
            .iter()
            .all(|turn| turn.speaker != Speaker::User)
    }
}
