//! Wire records for the coach backend, one request/response pair per
//! endpoint.
//!
//! The backend wraps every outcome in an HTTP 200 and reports the real
//! outcome in a `status` body field, so each response record carries one.
//! Field names follow the backend contract verbatim (`uid`, `cid`,
//! `chat_uid`, `c_uid`, `updated_title`).

use serde::{Deserialize, Serialize};

/// Sentinel sent as `chat_uid` for a conversation the server has not yet
/// assigned an id to. The save-turn response then carries the assigned id.
pub const CHAT_UID_UNSET: &str = "unset";

pub const SEND_MESSAGE_PATH: &str = "api/chatbot/messages/";
pub const SIGN_UP_PATH: &str = "api/chatbot/signup/";
pub const LOGIN_PATH: &str = "api/chatbot/login/";
pub const SAVE_TURN_PATH: &str = "api/chatbot/upload/";
pub const LOAD_HISTORY_PATH: &str = "api/chatbot/history/";
pub const DELETE_CHAT_PATH: &str = "api/chatbot/delete/";
pub const RENAME_CHAT_PATH: &str = "api/chatbot/rename/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendMessageResponse {
    pub text: String,
    #[serde(default)]
    pub video: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialsRequest<'a> {
    pub uid: &'a str,
    pub pass: &'a str,
    pub key: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    pub status: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveTurnRequest<'a> {
    pub uid: &'a str,
    pub question: &'a str,
    pub answer: &'a str,
    pub video: &'a str,
    /// Conversation title; the backend stores it as `chat_id`.
    pub cid: &'a str,
    pub chat_uid: &'a str,
    pub key: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaveTurnResponse {
    pub status: u16,
    #[serde(default)]
    pub chat_uid: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadHistoryRequest<'a> {
    pub uid: &'a str,
    pub key: &'a str,
}

/// One flat persisted exchange as the backend returns it, ordered by
/// creation time across all conversations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryRow {
    pub chat_uid: String,
    /// Conversation title.
    pub chat_id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub video: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadHistoryResponse {
    pub status: u16,
    #[serde(default)]
    pub conversations: Vec<HistoryRow>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteChatRequest<'a> {
    pub uid: &'a str,
    pub chat: &'a str,
    pub key: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameChatRequest<'a> {
    pub uid: &'a str,
    pub c_uid: &'a str,
    pub updated_title: &'a str,
    pub key: &'a str,
}

/// Minimal envelope for endpoints that answer with status only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    pub status: u16,
    #[serde(default)]
    pub error: Option<String>,
}
