use snafu::Snafu;

use crate::message::{Conversation, ConversationKey, RemoteId, RevealTarget, Turn, TurnId};

/// Number of leading words kept when deriving a title from the first message.
pub const TITLE_WORD_LIMIT: usize = 4;

/// Fixed assistant notice appended when a reply fetch fails.
pub const BACKEND_UNREACHABLE_NOTICE: &str = "backend unreachable, try again later";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("input text is empty after trimming"))]
    EmptyInput { stage: &'static str },
    #[snafu(display("conversation index {index} is out of range for {len} conversations"))]
    OutOfRange {
        stage: &'static str,
        index: usize,
        len: usize,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One question/answer pair restored from remote history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredExchange {
    pub question: String,
    pub answer: String,
    pub video_link: Option<String>,
}

/// One conversation restored from remote history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredConversation {
    pub remote_id: String,
    pub title: String,
    pub exchanges: Vec<RestoredExchange>,
}

/// In-memory owner of every conversation thread and the active pointer.
///
/// Public operations are index-based to match the list the render surface
/// shows; every asynchronous write path instead goes through a
/// [`RevealTarget`] or [`ConversationKey`] captured up front, so a stream or
/// a late backend response lands in its originating conversation no matter
/// how the list has shifted since.
#[derive(Debug, Default)]
pub struct ChatStore {
    conversations: Vec<Conversation>,
    active: Option<usize>,
    next_key: u64,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Returns the active conversation, if one is selected.
    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active.and_then(|index| self.conversations.get(index))
    }

    pub fn get(&self, index: usize) -> Option<&Conversation> {
        self.conversations.get(index)
    }

    pub fn find_by_key(&self, key: ConversationKey) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| conversation.key == key)
    }

    /// Resolves a stable key back to its current list index.
    pub fn index_of(&self, key: ConversationKey) -> Option<usize> {
        self.conversations
            .iter()
            .position(|conversation| conversation.key == key)
    }

    fn find_by_key_mut(&mut self, key: ConversationKey) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|conversation| conversation.key == key)
    }

    fn alloc_key(&mut self) -> ConversationKey {
        let key = ConversationKey::new(self.next_key);
        self.next_key = self.next_key.saturating_add(1);
        key
    }

    /// Appends an empty conversation with a placeholder title and activates it.
    pub fn create_conversation(&mut self) -> ConversationKey {
        let key = self.alloc_key();
        let title = format!("Chat {}", self.conversations.len() + 1);
        self.conversations.push(Conversation::new(key, title));
        self.active = Some(self.conversations.len() - 1);
        key
    }

    /// Moves the active pointer to the given conversation.
    ///
    /// The active view reads the conversation's turns in place through the
    /// store, so reveal writes show up in the view and the stored entry at
    /// the same time.
    pub fn switch_to(&mut self, index: usize) -> StoreResult<()> {
        if index >= self.conversations.len() {
            return OutOfRangeSnafu {
                stage: "switch-to",
                index,
                len: self.conversations.len(),
            }
            .fail();
        }

        self.active = Some(index);
        Ok(())
    }

    /// Appends a user turn, deriving the title on the first user message.
    pub fn append_user_turn(&mut self, index: usize, text: &str) -> StoreResult<TurnId> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return EmptyInputSnafu {
                stage: "append-user-turn",
            }
            .fail();
        }

        let len = self.conversations.len();
        let Some(conversation) = self.conversations.get_mut(index) else {
            return OutOfRangeSnafu {
                stage: "append-user-turn",
                index,
                len,
            }
            .fail();
        };

        if conversation.awaiting_first_user_turn() {
            conversation.title = derive_title(trimmed);
        }

        let turn_id = conversation.alloc_turn_id();
        conversation.turns.push(Turn::user(turn_id, trimmed));
        Ok(turn_id)
    }

    /// Appends the assistant placeholder a reveal stream will write into.
    ///
    /// Returns the routing key the stream must carry for every write.
    pub fn append_assistant_placeholder(
        &mut self,
        index: usize,
        video_link: Option<String>,
    ) -> StoreResult<RevealTarget> {
        let len = self.conversations.len();
        let Some(conversation) = self.conversations.get_mut(index) else {
            return OutOfRangeSnafu {
                stage: "append-assistant-placeholder",
                index,
                len,
            }
            .fail();
        };

        let turn_id = conversation.alloc_turn_id();
        conversation
            .turns
            .push(Turn::assistant_placeholder(turn_id, video_link));
        Ok(RevealTarget::new(conversation.key, turn_id))
    }

    /// Appends a fully revealed assistant turn, used for the opening greeting.
    pub fn seed_greeting(&mut self, index: usize, text: &str) -> StoreResult<TurnId> {
        let len = self.conversations.len();
        let Some(conversation) = self.conversations.get_mut(index) else {
            return OutOfRangeSnafu {
                stage: "seed-greeting",
                index,
                len,
            }
            .fail();
        };

        let turn_id = conversation.alloc_turn_id();
        conversation
            .turns
            .push(Turn::assistant_revealed(turn_id, text, None));
        Ok(turn_id)
    }

    /// Removes a conversation and reassigns the active pointer.
    ///
    /// The pointer moves to the first remaining conversation, or to none when
    /// the list empties. Returns the removed conversation's server id so the
    /// caller can propagate the deletion remotely.
    pub fn delete_conversation(&mut self, index: usize) -> StoreResult<RemoteId> {
        if index >= self.conversations.len() {
            return OutOfRangeSnafu {
                stage: "delete-conversation",
                index,
                len: self.conversations.len(),
            }
            .fail();
        }

        let removed = self.conversations.remove(index);

        self.active = match self.active {
            None => None,
            Some(_) if self.conversations.is_empty() => None,
            Some(active) if active == index => Some(0),
            Some(active) if active > index => Some(active - 1),
            Some(active) => Some(active),
        };

        Ok(removed.remote_id)
    }

    /// Renames a conversation, returning the old title for rollback.
    ///
    /// A title that trims to empty is rejected before any mutation.
    pub fn rename_conversation(&mut self, index: usize, new_title: &str) -> StoreResult<String> {
        let trimmed = new_title.trim();
        if trimmed.is_empty() {
            return EmptyInputSnafu {
                stage: "rename-conversation",
            }
            .fail();
        }

        let len = self.conversations.len();
        let Some(conversation) = self.conversations.get_mut(index) else {
            return OutOfRangeSnafu {
                stage: "rename-conversation",
                index,
                len,
            }
            .fail();
        };

        let old_title = std::mem::replace(&mut conversation.title, trimmed.to_string());
        Ok(old_title)
    }

    /// Restores a title after a failed remote rename. Keyed, because the
    /// conversation's index may have shifted while the call was in flight.
    pub fn restore_title(&mut self, key: ConversationKey, title: String) -> bool {
        match self.find_by_key_mut(key) {
            Some(conversation) => {
                conversation.title = title;
                true
            }
            None => false,
        }
    }

    /// Appends one reveal word to the targeted turn.
    ///
    /// Returns false when the target has vanished; the write is dropped, not
    /// an error, because deletion mid-stream is a legal interleaving.
    pub fn apply_reveal_step(&mut self, target: RevealTarget, word: &str) -> bool {
        let Some(conversation) = self.find_by_key_mut(target.conversation) else {
            return false;
        };
        let Some(turn) = conversation.turn_mut(target.turn) else {
            return false;
        };

        if !turn.text.is_empty() {
            turn.text.push(' ');
        }
        turn.text.push_str(word);
        true
    }

    /// Marks the targeted turn fully revealed, unveiling its video link.
    pub fn complete_reveal(&mut self, target: RevealTarget) -> bool {
        let Some(conversation) = self.find_by_key_mut(target.conversation) else {
            return false;
        };
        let Some(turn) = conversation.turn_mut(target.turn) else {
            return false;
        };

        turn.video_revealed = true;
        true
    }

    /// Attaches the server-assigned id after the first successful persist.
    pub fn attach_remote_id(&mut self, key: ConversationKey, remote_id: String) -> bool {
        match self.find_by_key_mut(key) {
            Some(conversation) => {
                conversation.remote_id = RemoteId::Assigned(remote_id);
                true
            }
            None => false,
        }
    }

    /// Appends the fixed error notice after a failed reply fetch.
    pub fn append_error_turn(&mut self, key: ConversationKey, text: &str) -> bool {
        let Some(conversation) = self.find_by_key_mut(key) else {
            return false;
        };

        let turn_id = conversation.alloc_turn_id();
        conversation
            .turns
            .push(Turn::assistant_revealed(turn_id, text, None));
        true
    }

    /// Replaces every conversation with restored remote history.
    ///
    /// Restored turns are never re-streamed: each exchange expands into a
    /// user turn and a fully revealed assistant turn, in arrival order.
    pub fn replace_all(&mut self, restored: Vec<RestoredConversation>) {
        self.conversations.clear();

        for entry in restored {
            let key = self.alloc_key();
            let mut conversation = Conversation::new(key, entry.title);
            conversation.remote_id = RemoteId::Assigned(entry.remote_id);

            for exchange in entry.exchanges {
                let user_id = conversation.alloc_turn_id();
                conversation.turns.push(Turn::user(user_id, exchange.question));
                let assistant_id = conversation.alloc_turn_id();
                conversation.turns.push(Turn::assistant_revealed(
                    assistant_id,
                    exchange.answer,
                    exchange.video_link,
                ));
            }

            self.conversations.push(conversation);
        }

        self.active = if self.conversations.is_empty() {
            None
        } else {
            Some(0)
        };
    }

    /// Hard reset used on logout.
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.active = None;
    }
}

/// Derives a conversation title from the first user message: the first
/// [`TITLE_WORD_LIMIT`] whitespace-separated words, with `...` appended when
/// the input had more.
fn derive_title(text: &str) -> String {
    let words = text.split_whitespace().collect::<Vec<_>>();

    if words.len() <= TITLE_WORD_LIMIT {
        words.join(" ")
    } else {
        let mut title = words[..TITLE_WORD_LIMIT].join(" ");
        title.push_str("...");
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Speaker;

    fn store_with_conversations(count: usize) -> ChatStore {
        let mut store = ChatStore::new();
        for _ in 0..count {
            store.create_conversation();
        }
        store
    }

    #[test]
    fn create_activates_new_conversation() {
        let mut store = ChatStore::new();
        assert_eq!(store.active_index(), None);

        store.create_conversation();
        store.create_conversation();

        assert_eq!(store.conversations().len(), 2);
        assert_eq!(store.active_index(), Some(1));
        assert_eq!(store.conversations()[0].title, "Chat 1");
        assert_eq!(store.conversations()[1].title, "Chat 2");
    }

    #[test]
    fn switch_rejects_out_of_range_index() {
        let mut store = store_with_conversations(1);

        let error = store.switch_to(3).unwrap_err();
        assert!(matches!(
            error,
            StoreError::OutOfRange { index: 3, len: 1, .. }
        ));
        assert_eq!(store.active_index(), Some(0));
    }

    #[test]
    fn blank_user_turn_is_rejected_before_mutation() {
        let mut store = store_with_conversations(1);

        let error = store.append_user_turn(0, "   \t ").unwrap_err();
        assert!(matches!(error, StoreError::EmptyInput { .. }));
        assert!(store.conversations()[0].turns.is_empty());
    }

    #[test]
    fn first_user_turn_derives_title() {
        let mut store = store_with_conversations(1);

        store.append_user_turn(0, "  how do I budget  ").unwrap();
        assert_eq!(store.conversations()[0].title, "how do I budget");
    }

    #[test]
    fn long_first_message_truncates_title_with_marker() {
        let mut store = store_with_conversations(1);

        store
            .append_user_turn(0, "how do I budget for a new house")
            .unwrap();
        assert_eq!(store.conversations()[0].title, "how do I budget...");
    }

    #[test]
    fn greeting_does_not_block_title_derivation() {
        let mut store = store_with_conversations(1);
        store.seed_greeting(0, "Hello! I'm your Finance Coach.").unwrap();

        store.append_user_turn(0, "what is an index fund").unwrap();
        assert_eq!(store.conversations()[0].title, "what is an index...");

        // A second message must not re-derive.
        store.append_user_turn(0, "and what about bonds").unwrap();
        assert_eq!(store.conversations()[0].title, "what is an index...");
    }

    #[test]
    fn deleting_only_conversation_clears_pointer() {
        let mut store = store_with_conversations(1);

        store.delete_conversation(0).unwrap();
        assert_eq!(store.active_index(), None);
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn deleting_active_entry_moves_pointer_to_first_remaining() {
        let mut store = store_with_conversations(3);
        store.switch_to(1).unwrap();

        store.delete_conversation(1).unwrap();
        assert_eq!(store.active_index(), Some(0));
    }

    #[test]
    fn deleting_non_active_entry_keeps_pointer_referent() {
        let mut store = store_with_conversations(3);
        store.switch_to(2).unwrap();
        let active_key = store.active_conversation().unwrap().key;

        store.delete_conversation(0).unwrap();

        assert_eq!(store.active_conversation().unwrap().key, active_key);
    }

    #[test]
    fn delete_returns_remote_id_for_propagation() {
        let mut store = store_with_conversations(1);
        let key = store.conversations()[0].key;
        store.attach_remote_id(key, "srv-1".to_string());

        let removed = store.delete_conversation(0).unwrap();
        assert_eq!(removed.assigned(), Some("srv-1"));
    }

    #[test]
    fn blank_rename_is_rejected_and_list_unchanged() {
        let mut store = store_with_conversations(1);

        let error = store.rename_conversation(0, "   ").unwrap_err();
        assert!(matches!(error, StoreError::EmptyInput { .. }));
        assert_eq!(store.conversations()[0].title, "Chat 1");
    }

    #[test]
    fn rename_returns_old_title_and_rollback_restores_it() {
        let mut store = store_with_conversations(1);
        let key = store.conversations()[0].key;

        let old = store.rename_conversation(0, "Retirement plan").unwrap();
        assert_eq!(old, "Chat 1");
        assert_eq!(store.conversations()[0].title, "Retirement plan");

        assert!(store.restore_title(key, old));
        assert_eq!(store.conversations()[0].title, "Chat 1");
    }

    #[test]
    fn reveal_steps_join_words_and_completion_unveils_video() {
        let mut store = store_with_conversations(1);
        store.append_user_turn(0, "question").unwrap();
        let target = store
            .append_assistant_placeholder(0, Some("https://www.youtube.com/embed/abc".into()))
            .unwrap();

        for word in ["save", "ten", "percent"] {
            assert!(store.apply_reveal_step(target, word));
            let turn = store.conversations()[0].turn(target.turn).unwrap();
            assert!(!turn.video_revealed);
        }

        assert!(store.complete_reveal(target));
        let turn = store.conversations()[0].turn(target.turn).unwrap();
        assert_eq!(turn.text, "save ten percent");
        assert!(turn.video_revealed);
    }

    #[test]
    fn reveal_writes_survive_list_mutation_and_follow_the_key() {
        let mut store = store_with_conversations(2);
        store.switch_to(1).unwrap();
        store.append_user_turn(1, "question").unwrap();
        let target = store.append_assistant_placeholder(1, None).unwrap();

        // Deleting the conversation in front shifts every index.
        store.delete_conversation(0).unwrap();

        assert!(store.apply_reveal_step(target, "steady"));
        let conversation = store.find_by_key(target.conversation).unwrap();
        assert_eq!(conversation.turn(target.turn).unwrap().text, "steady");
    }

    #[test]
    fn reveal_write_to_deleted_conversation_is_dropped() {
        let mut store = store_with_conversations(1);
        let target = store.append_assistant_placeholder(0, None).unwrap();

        store.delete_conversation(0).unwrap();

        assert!(!store.apply_reveal_step(target, "gone"));
        assert!(!store.complete_reveal(target));
    }

    #[test]
    fn replace_all_builds_revealed_turns_and_resets_pointer() {
        let mut store = store_with_conversations(2);

        store.replace_all(vec![RestoredConversation {
            remote_id: "srv-9".to_string(),
            title: "Budgeting".to_string(),
            exchanges: vec![
                RestoredExchange {
                    question: "q1".to_string(),
                    answer: "a1".to_string(),
                    video_link: None,
                },
                RestoredExchange {
                    question: "q2".to_string(),
                    answer: "a2".to_string(),
                    video_link: Some("https://www.youtube.com/embed/x".to_string()),
                },
            ],
        }]);

        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.active_index(), Some(0));

        let conversation = &store.conversations()[0];
        assert_eq!(conversation.remote_id.assigned(), Some("srv-9"));
        assert_eq!(conversation.turns.len(), 4);
        assert_eq!(conversation.turns[0].speaker, Speaker::User);
        assert_eq!(conversation.turns[1].speaker, Speaker::Assistant);
        assert!(conversation.turns[1].video_revealed);
        assert!(conversation.turns[3].video_revealed);
        assert_eq!(conversation.turns[2].text, "q2");
    }

    #[test]
    fn clear_is_a_hard_reset() {
        let mut store = store_with_conversations(2);
        store.append_user_turn(0, "hello there").unwrap();

        store.clear();

        assert!(store.conversations().is_empty());
        assert_eq!(store.active_index(), None);
    }
}
