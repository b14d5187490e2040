use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("backend request failed on `{stage}`: {source}"))]
    Unreachable {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("backend returned HTTP status {status} on `{stage}`"))]
    RejectedStatus { stage: &'static str, status: u16 },
    #[snafu(display("failed to decode backend response on `{stage}`: {details}"))]
    MalformedResponse {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("authentication rejected with status {status}: {details}"))]
    Auth {
        stage: &'static str,
        status: u16,
        details: String,
    },
}

impl BackendError {
    /// True for the unreachable class: transport, HTTP, or decode failures.
    ///
    /// Authentication rejections are deliberate server answers and are
    /// handled separately (the session stays logged out, nothing is retried
    /// or rewritten locally).
    pub fn is_unreachable(&self) -> bool {
        !matches!(self, Self::Auth { .. })
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
