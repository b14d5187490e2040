use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

use crate::error::{BackendError, BackendResult, RejectedStatusSnafu, UnreachableSnafu};
use crate::video::normalize_video_link;
use crate::wire::{
    AuthResponse, CHAT_UID_UNSET, CredentialsRequest, DELETE_CHAT_PATH, DeleteChatRequest,
    HistoryRow, LOAD_HISTORY_PATH, LOGIN_PATH, LoadHistoryRequest, LoadHistoryResponse,
    RENAME_CHAT_PATH, RenameChatRequest, SAVE_TURN_PATH, SEND_MESSAGE_PATH, SIGN_UP_PATH,
    SaveTurnRequest, SaveTurnResponse, SendMessageRequest, SendMessageResponse, StatusResponse,
};

/// Default per-request timeout for backend calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One assistant reply as the adapter hands it to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub video_link: Option<String>,
}

/// One completed exchange to persist.
///
/// The caller captures question/answer/video when the reply arrives; the
/// adapter never reaches back into a conversation's turn list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTurn {
    pub uid: String,
    /// Server conversation id, or `None` for a conversation the server has
    /// not named yet (sent as the `"unset"` sentinel).
    pub chat_uid: Option<String>,
    pub title: String,
    pub question: String,
    pub answer: String,
    pub video_link: Option<String>,
}

/// Seam between the coordinator and the remote service.
///
/// The HTTP implementation lives below; tests substitute a scripted stub.
pub trait CoachBackend: Send + Sync {
    /// Asks the coach for a reply to one user message.
    fn request_reply<'a>(&'a self, text: &'a str) -> BoxFuture<'a, BackendResult<Reply>>;

    /// Registers a new account, returning the signed-in user id.
    fn sign_up<'a>(&'a self, uid: &'a str, pass: &'a str) -> BoxFuture<'a, BackendResult<String>>;

    /// Authenticates an existing account, returning the signed-in user id.
    fn login<'a>(&'a self, uid: &'a str, pass: &'a str) -> BoxFuture<'a, BackendResult<String>>;

    /// Persists one completed exchange; returns the server-assigned
    /// conversation id when the request carried the sentinel.
    fn save_turn<'a>(&'a self, turn: &'a SaveTurn) -> BoxFuture<'a, BackendResult<Option<String>>>;

    /// Loads every persisted exchange for a user, flat, in arrival order.
    fn load_history<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, BackendResult<Vec<HistoryRow>>>;

    /// Deletes a conversation remotely. Fire-and-forget for the caller.
    fn delete_chat<'a>(
        &'a self,
        uid: &'a str,
        chat_uid: &'a str,
    ) -> BoxFuture<'a, BackendResult<()>>;

    /// Renames a conversation remotely. The caller rolls back on failure.
    fn rename_chat<'a>(
        &'a self,
        uid: &'a str,
        chat_uid: &'a str,
        new_title: &'a str,
    ) -> BoxFuture<'a, BackendResult<()>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    /// Shared static authorization token sent with every mutating request.
    /// Validating it is the server's concern.
    pub master_key: String,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, master_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().to_string(),
            master_key: master_key.into().trim().to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Reqwest-backed implementation of [`CoachBackend`].
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context(UnreachableSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<Request, Response>(
        &self,
        stage: &'static str,
        path: &str,
        body: &Request,
    ) -> BackendResult<Response>
    where
        Request: Serialize,
        Response: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .context(UnreachableSnafu { stage })?;

        let status = response.status();
        if !status.is_success() {
            return RejectedStatusSnafu {
                stage,
                status: status.as_u16(),
            }
            .fail();
        }

        response
            .json::<Response>()
            .await
            .map_err(|source| BackendError::MalformedResponse {
                stage,
                details: source.to_string(),
            })
    }

    /// Maps a body-level `status` field to the auth taxonomy.
    ///
    /// The backend answers HTTP 200 even for rejected credentials and
    /// duplicate signups; the real outcome (401/404/409) is in the body.
    fn check_auth(stage: &'static str, response: AuthResponse, uid: &str) -> BackendResult<String> {
        if response.status != 200 {
            return Err(BackendError::Auth {
                stage,
                status: response.status,
                details: response
                    .error
                    .unwrap_or_else(|| "authentication failed".to_string()),
            });
        }

        Ok(response.user.unwrap_or_else(|| uid.to_string()))
    }

    fn check_body_status(stage: &'static str, status: u16, error: Option<String>) -> BackendResult<()> {
        if status != 200 {
            tracing::warn!(stage, status, error = error.as_deref(), "backend reported failure");
            return RejectedStatusSnafu { stage, status }.fail();
        }
        Ok(())
    }
}

impl CoachBackend for HttpBackend {
    fn request_reply<'a>(&'a self, text: &'a str) -> BoxFuture<'a, BackendResult<Reply>> {
        Box::pin(async move {
            let response: SendMessageResponse = self
                .post_json("request-reply", SEND_MESSAGE_PATH, &SendMessageRequest { text })
                .await?;

            Ok(Reply {
                text: response.text,
                video_link: response
                    .video
                    .as_deref()
                    .and_then(normalize_video_link),
            })
        })
    }

    fn sign_up<'a>(&'a self, uid: &'a str, pass: &'a str) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move {
            let request = CredentialsRequest {
                uid,
                pass,
                key: &self.config.master_key,
            };
            let response: AuthResponse = self.post_json("sign-up", SIGN_UP_PATH, &request).await?;
            Self::check_auth("sign-up", response, uid)
        })
    }

    fn login<'a>(&'a self, uid: &'a str, pass: &'a str) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move {
            let request = CredentialsRequest {
                uid,
                pass,
                key: &self.config.master_key,
            };
            let response: AuthResponse = self.post_json("login", LOGIN_PATH, &request).await?;
            Self::check_auth("login", response, uid)
        })
    }

    fn save_turn<'a>(&'a self, turn: &'a SaveTurn) -> BoxFuture<'a, BackendResult<Option<String>>> {
        Box::pin(async move {
            let request = SaveTurnRequest {
                uid: &turn.uid,
                question: &turn.question,
                answer: &turn.answer,
                video: turn.video_link.as_deref().unwrap_or(""),
                cid: &turn.title,
                chat_uid: turn.chat_uid.as_deref().unwrap_or(CHAT_UID_UNSET),
                key: &self.config.master_key,
            };

            let response: SaveTurnResponse =
                self.post_json("save-turn", SAVE_TURN_PATH, &request).await?;
            Self::check_body_status("save-turn", response.status, response.error)?;

            Ok(response.chat_uid)
        })
    }

    fn load_history<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, BackendResult<Vec<HistoryRow>>> {
        Box::pin(async move {
            let request = LoadHistoryRequest {
                uid,
                key: &self.config.master_key,
            };

            let response: LoadHistoryResponse = self
                .post_json("load-history", LOAD_HISTORY_PATH, &request)
                .await?;
            Self::check_body_status("load-history", response.status, response.error)?;

            Ok(response.conversations)
        })
    }

    fn delete_chat<'a>(
        &'a self,
        uid: &'a str,
        chat_uid: &'a str,
    ) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            let request = DeleteChatRequest {
                uid,
                chat: chat_uid,
                key: &self.config.master_key,
            };

            let response: StatusResponse =
                self.post_json("delete-chat", DELETE_CHAT_PATH, &request).await?;
            Self::check_body_status("delete-chat", response.status, response.error)
        })
    }

    fn rename_chat<'a>(
        &'a self,
        uid: &'a str,
        chat_uid: &'a str,
        new_title: &'a str,
    ) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            let request = RenameChatRequest {
                uid,
                c_uid: chat_uid,
                updated_title: new_title,
                key: &self.config.master_key,
            };

            let response: StatusResponse =
                self.post_json("rename-chat", RENAME_CHAT_PATH, &request).await?;
            Self::check_body_status("rename-chat", response.status, response.error)
        })
    }
}
