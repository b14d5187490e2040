use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use fincoach_chat::{
    BACKEND_UNREACHABLE_NOTICE, ChatStore, ConversationKey, RestoredConversation,
    RestoredExchange, RevealEvent, RevealTarget, reveal_stream,
};
use fincoach_remote::{
    BackendResult, CoachBackend, HistoryRow, Reply, SaveTurn, group_history,
};
use fincoach_session::{SessionManager, SessionStore};

use crate::events::{Command, UiEvent};

/// Tunables the coordinator takes from [`crate::AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    pub reveal_cadence: Duration,
    /// Opening assistant message for a fresh conversation; empty disables it.
    pub greeting: String,
}

/// Everything captured about one exchange at reply time.
///
/// The persist call reads only this context, never the turn list, so an odd
/// turn count (a failed reply, a seeded greeting) can never skew what gets
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExchangeContext {
    question: String,
    answer: String,
    video_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthIntent {
    Login,
    Signup,
}

/// Results of spawned work, reported back into the owning task.
#[derive(Debug)]
enum InternalEvent {
    ReplyArrived {
        key: ConversationKey,
        question: String,
        result: BackendResult<Reply>,
    },
    Reveal(RevealEvent),
    PersistFinished {
        key: ConversationKey,
        result: BackendResult<Option<String>>,
    },
    HistoryLoaded {
        result: BackendResult<Vec<HistoryRow>>,
    },
    AuthFinished {
        intent: AuthIntent,
        result: BackendResult<String>,
    },
    RenameFinished {
        key: ConversationKey,
        old_title: String,
        result: BackendResult<()>,
    },
    DeleteFinished {
        result: BackendResult<()>,
    },
}

/// Single owner of the conversation list, the session, and every in-flight
/// exchange.
///
/// All mutations funnel through one task: the render surface sends
/// [`Command`]s, spawned work reports [`InternalEvent`]s, and both drain in
/// the same select loop, so no two mutations of the same conversation can
/// interleave mid-step. Asynchronous writes are keyed by
/// [`ConversationKey`]/[`RevealTarget`] captured up front, so switching the
/// active conversation never redirects or cancels a foreign stream.
pub struct ChatService {
    store: ChatStore,
    session: SessionManager,
    backend: Arc<dyn CoachBackend>,
    options: ServiceOptions,
    typing: HashSet<ConversationKey>,
    exchanges: HashMap<RevealTarget, ExchangeContext>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    events_tx: mpsc::UnboundedSender<UiEvent>,
    pending_ops: usize,
}

impl ChatService {
    pub fn new(
        backend: Arc<dyn CoachBackend>,
        session_store: Arc<dyn SessionStore>,
        options: ServiceOptions,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let service = Self {
            store: ChatStore::new(),
            session: SessionManager::new(session_store),
            backend,
            options,
            typing: HashSet::new(),
            exchanges: HashMap::new(),
            internal_tx,
            internal_rx,
            events_tx,
            pending_ops: 0,
        };

        (service, events_rx)
    }

    /// Runs the coordinator until `Shutdown` or the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.restore_session();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.internal_rx.recv() => self.handle_internal(event),
            }
        }

        tracing::debug!("coordinator stopped");
    }

    /// Startup path: restore a persisted session and, when one is live,
    /// repopulate the store from remote history.
    fn restore_session(&mut self) {
        let restored = self
            .session
            .restore(now_ms())
            .map(|session| session.user_id.clone());

        if let Some(user_id) = restored {
            self.emit(UiEvent::SessionChanged {
                user_id: Some(user_id.clone()),
            });
            self.spawn_history_load(user_id);
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit(text) => self.submit(text),
            Command::NewConversation => {
                self.create_conversation();
                self.emit_list();
                self.emit_active_turns();
            }
            Command::Switch(index) => match self.store.switch_to(index) {
                Ok(_) => {
                    self.emit_list();
                    self.emit_active_turns();
                }
                Err(error) => self.notice(error.to_string()),
            },
            Command::Delete(index) => self.delete(index),
            Command::Rename { index, title } => self.rename(index, title),
            Command::Login { uid, pass } => self.spawn_auth(AuthIntent::Login, uid, pass),
            Command::Signup { uid, pass } => self.spawn_auth(AuthIntent::Signup, uid, pass),
            Command::Logout => self.logout(),
            Command::Shutdown => {}
        }
    }

    fn submit(&mut self, text: String) {
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() {
            // Rejected before any state mutation; no conversation is created.
            self.notice("message text is empty".to_string());
            return;
        }

        if self.store.active_index().is_none() {
            self.create_conversation();
        }

        let Some(index) = self.store.active_index() else {
            return;
        };
        let Some(key) = self.store.get(index).map(|conversation| conversation.key) else {
            return;
        };

        if let Err(error) = self.store.append_user_turn(index, &trimmed) {
            self.notice(error.to_string());
            return;
        }

        // The user turn is published before the reply request goes out.
        self.emit_list();
        self.emit_active_turns();

        if self.typing.insert(key) {
            self.emit(UiEvent::TypingChanged {
                conversation: key,
                typing: true,
            });
        }

        self.spawn_reply_fetch(key, trimmed);
    }

    fn create_conversation(&mut self) {
        self.store.create_conversation();

        if !self.options.greeting.is_empty()
            && let Some(index) = self.store.active_index()
        {
            let greeting = self.options.greeting.clone();
            let _ = self.store.seed_greeting(index, &greeting);
        }
    }

    fn delete(&mut self, index: usize) {
        let Some(key) = self.store.get(index).map(|conversation| conversation.key) else {
            self.notice(format!("conversation index {index} is out of range"));
            return;
        };

        match self.store.delete_conversation(index) {
            Ok(remote_id) => {
                self.clear_typing(key);
                self.emit_list();
                self.emit_active_turns();

                let uid = self.session.user_id().map(str::to_string);
                if let (Some(uid), Some(chat_uid)) =
                    (uid, remote_id.assigned().map(str::to_string))
                {
                    self.spawn_delete_remote(uid, chat_uid);
                }
            }
            Err(error) => self.notice(error.to_string()),
        }
    }

    fn rename(&mut self, index: usize, title: String) {
        let Some(key) = self.store.get(index).map(|conversation| conversation.key) else {
            self.notice(format!("conversation index {index} is out of range"));
            return;
        };

        match self.store.rename_conversation(index, &title) {
            Ok(old_title) => {
                self.emit_list();

                let uid = self.session.user_id().map(str::to_string);
                let chat_uid = self
                    .store
                    .find_by_key(key)
                    .and_then(|conversation| conversation.remote_id.assigned())
                    .map(str::to_string);

                if let (Some(uid), Some(chat_uid)) = (uid, chat_uid) {
                    self.spawn_rename_remote(key, old_title, uid, chat_uid, title.trim().to_string());
                }
            }
            Err(error) => self.notice(error.to_string()),
        }
    }

    fn logout(&mut self) {
        self.session.logout();
        self.store.clear();
        self.exchanges.clear();

        let typing = self.typing.drain().collect::<Vec<_>>();
        for key in typing {
            self.emit(UiEvent::TypingChanged {
                conversation: key,
                typing: false,
            });
        }

        self.emit(UiEvent::SessionChanged { user_id: None });
        self.emit_list();
        self.emit_active_turns();
    }

    fn handle_internal(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::ReplyArrived {
                key,
                question,
                result,
            } => self.on_reply_arrived(key, question, result),
            InternalEvent::Reveal(RevealEvent::Step { target, word }) => {
                if self.store.apply_reveal_step(target, &word) {
                    self.emit_turns_if_active(target.conversation);
                } else {
                    tracing::debug!(?target, "dropping reveal step for vanished target");
                }
            }
            InternalEvent::Reveal(RevealEvent::Completed { target }) => {
                self.on_reveal_completed(target)
            }
            InternalEvent::PersistFinished { key, result } => {
                self.pending_ops = self.pending_ops.saturating_sub(1);
                match result {
                    Ok(Some(assigned)) => {
                        self.store.attach_remote_id(key, assigned);
                    }
                    Ok(None) => {}
                    Err(error) => {
                        // At-most-once by design: log, never retry.
                        tracing::warn!(%error, ?key, "persist failed; exchange not mirrored remotely");
                    }
                }
            }
            InternalEvent::HistoryLoaded { result } => {
                self.pending_ops = self.pending_ops.saturating_sub(1);
                match result {
                    Ok(rows) => {
                        let restored = group_history(rows)
                            .into_iter()
                            .map(|conversation| RestoredConversation {
                                remote_id: conversation.chat_uid,
                                title: conversation.title,
                                exchanges: conversation
                                    .exchanges
                                    .into_iter()
                                    .map(|exchange| RestoredExchange {
                                        question: exchange.question,
                                        answer: exchange.answer,
                                        video_link: exchange.video_link,
                                    })
                                    .collect(),
                            })
                            .collect();

                        self.store.replace_all(restored);
                        self.emit_list();
                        self.emit_active_turns();
                    }
                    Err(error) => {
                        tracing::warn!(%error, "history load failed; starting with an empty list");
                    }
                }
            }
            InternalEvent::AuthFinished { intent, result } => {
                self.pending_ops = self.pending_ops.saturating_sub(1);
                match result {
                    Ok(user_id) => {
                        self.session.establish(user_id.as_str(), now_ms());
                        self.emit(UiEvent::SessionChanged {
                            user_id: Some(user_id.clone()),
                        });

                        // A fresh account has no history to load.
                        if intent == AuthIntent::Login {
                            self.spawn_history_load(user_id);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, ?intent, "authentication failed");
                        self.notice(error.to_string());
                    }
                }
            }
            InternalEvent::RenameFinished {
                key,
                old_title,
                result,
            } => {
                self.pending_ops = self.pending_ops.saturating_sub(1);
                if let Err(error) = result {
                    tracing::warn!(%error, ?key, "remote rename failed; rolling back title");
                    if self.store.restore_title(key, old_title) {
                        self.emit_list();
                    }
                }
            }
            InternalEvent::DeleteFinished { result } => {
                self.pending_ops = self.pending_ops.saturating_sub(1);
                if let Err(error) = result {
                    // Local deletion stands; resurrecting a conversation the
                    // user removed would be worse than a stray remote row.
                    tracing::warn!(%error, "remote delete failed");
                }
            }
        }
    }

    fn on_reply_arrived(
        &mut self,
        key: ConversationKey,
        question: String,
        result: BackendResult<Reply>,
    ) {
        self.pending_ops = self.pending_ops.saturating_sub(1);

        match result {
            Ok(reply) => {
                let Some(index) = self.store.index_of(key) else {
                    tracing::debug!(?key, "conversation deleted before its reply arrived");
                    self.clear_typing(key);
                    return;
                };

                let Ok(target) = self
                    .store
                    .append_assistant_placeholder(index, reply.video_link.clone())
                else {
                    return;
                };

                self.exchanges.insert(
                    target,
                    ExchangeContext {
                        question,
                        answer: reply.text.clone(),
                        video_link: reply.video_link,
                    },
                );

                self.emit_turns_if_active(key);
                self.spawn_reveal(target, &reply.text);
            }
            Err(error) => {
                tracing::warn!(%error, ?key, "reply fetch failed");
                if self.store.append_error_turn(key, BACKEND_UNREACHABLE_NOTICE) {
                    self.emit_turns_if_active(key);
                }
                self.clear_typing(key);
            }
        }
    }

    fn on_reveal_completed(&mut self, target: RevealTarget) {
        self.pending_ops = self.pending_ops.saturating_sub(1);

        let applied = self.store.complete_reveal(target);
        if applied {
            self.emit_turns_if_active(target.conversation);
        } else {
            tracing::debug!(?target, "reveal completed for vanished target");
        }

        self.clear_typing(target.conversation);

        let context = self.exchanges.remove(&target);
        if applied && let Some(context) = context {
            self.persist_exchange(target.conversation, context);
        }
    }

    /// Fires the at-most-once persist for a completed exchange, skipped
    /// without retry when no session is active.
    fn persist_exchange(&mut self, key: ConversationKey, context: ExchangeContext) {
        let Some(user_id) = self.session.user_id().map(str::to_string) else {
            tracing::info!(?key, "skipping persist: no active session");
            return;
        };

        let turn = {
            let Some(conversation) = self.store.find_by_key(key) else {
                return;
            };

            SaveTurn {
                uid: user_id,
                chat_uid: conversation.remote_id.assigned().map(str::to_string),
                title: conversation.title.clone(),
                question: context.question,
                answer: context.answer,
                video_link: context.video_link,
            }
        };

        self.spawn_persist(key, turn);
    }

    fn spawn_reply_fetch(&mut self, key: ConversationKey, question: String) {
        self.pending_ops += 1;
        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = backend.request_reply(&question).await;
            let _ = internal_tx.send(InternalEvent::ReplyArrived {
                key,
                question,
                result,
            });
        });
    }

    fn spawn_reveal(&mut self, target: RevealTarget, text: &str) {
        self.pending_ops += 1;
        let (mut events, worker) = reveal_stream(target, text, self.options.reveal_cadence);
        let internal_tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let forward = async {
                while let Some(event) = events.recv().await {
                    if internal_tx.send(InternalEvent::Reveal(event)).is_err() {
                        break;
                    }
                }
            };

            tokio::join!(worker, forward);
        });
    }

    fn spawn_persist(&mut self, key: ConversationKey, turn: SaveTurn) {
        self.pending_ops += 1;
        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = backend.save_turn(&turn).await;
            let _ = internal_tx.send(InternalEvent::PersistFinished { key, result });
        });
    }

    fn spawn_auth(&mut self, intent: AuthIntent, uid: String, pass: String) {
        self.pending_ops += 1;
        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = match intent {
                AuthIntent::Login => backend.login(&uid, &pass).await,
                AuthIntent::Signup => backend.sign_up(&uid, &pass).await,
            };
            let _ = internal_tx.send(InternalEvent::AuthFinished { intent, result });
        });
    }

    fn spawn_history_load(&mut self, uid: String) {
        self.pending_ops += 1;
        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = backend.load_history(&uid).await;
            let _ = internal_tx.send(InternalEvent::HistoryLoaded { result });
        });
    }

    fn spawn_rename_remote(
        &mut self,
        key: ConversationKey,
        old_title: String,
        uid: String,
        chat_uid: String,
        new_title: String,
    ) {
        self.pending_ops += 1;
        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = backend.rename_chat(&uid, &chat_uid, &new_title).await;
            let _ = internal_tx.send(InternalEvent::RenameFinished {
                key,
                old_title,
                result,
            });
        });
    }

    fn spawn_delete_remote(&mut self, uid: String, chat_uid: String) {
        self.pending_ops += 1;
        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = backend.delete_chat(&uid, &chat_uid).await;
            let _ = internal_tx.send(InternalEvent::DeleteFinished { result });
        });
    }

    fn clear_typing(&mut self, key: ConversationKey) {
        if self.typing.remove(&key) {
            self.emit(UiEvent::TypingChanged {
                conversation: key,
                typing: false,
            });
        }
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.events_tx.send(event);
    }

    fn notice(&self, message: String) {
        self.emit(UiEvent::Notice { message });
    }

    fn emit_list(&self) {
        self.emit(UiEvent::ConversationListChanged {
            titles: self
                .store
                .conversations()
                .iter()
                .map(|conversation| conversation.title.clone())
                .collect(),
            active: self.store.active_index(),
        });
    }

    fn emit_active_turns(&self) {
        let turns = self
            .store
            .active_conversation()
            .map(|conversation| conversation.turns.clone())
            .unwrap_or_default();
        self.emit(UiEvent::ActiveTurnsChanged { turns });
    }

    fn emit_turns_if_active(&self, key: ConversationKey) {
        if self
            .store
            .active_conversation()
            .is_some_and(|conversation| conversation.key == key)
        {
            self.emit_active_turns();
        }
    }

    /// Handles one queued internal event; used by the tests to interleave
    /// deterministically.
    #[cfg(test)]
    async fn step(&mut self) {
        if let Some(event) = self.internal_rx.recv().await {
            self.handle_internal(event);
        }
    }

    /// Drains internal events until every spawned operation has reported.
    #[cfg(test)]
    async fn pump_until_idle(&mut self) {
        while self.pending_ops > 0 {
            self.step().await;
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as u64)
}
