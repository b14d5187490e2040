pub mod message;
pub mod reveal;
pub mod store;

pub use message::{
    Conversation, ConversationKey, RemoteId, RevealTarget, Speaker, Turn, TurnId,
};
pub use reveal::{RevealEvent, RevealWorker, reveal_stream};
pub use store::{
    BACKEND_UNREACHABLE_NOTICE, ChatStore, RestoredConversation, RestoredExchange, StoreError,
    StoreResult, TITLE_WORD_LIMIT,
};
