use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use fincoach_remote::BackendConfig;
use serde::{Deserialize, Serialize};

pub const DATA_DIRECTORY_NAME: &str = ".fincoach";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const SESSION_FILE_NAME: &str = "session.conf";

/// Default backend origin, matching the development deployment.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Delay between reveal ticks of a streamed reply.
pub const DEFAULT_REVEAL_CADENCE_MS: u64 = 150;

/// Opening assistant message seeded into every fresh conversation.
pub const DEFAULT_GREETING: &str = "Hello! I'm your Finance Coach.\n I can help you with financial planning, budgeting, investing, and other money matters.\n Ask me anything about personal finance!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub base_url: String,
    /// Shared static authorization token; empty means the server will
    /// reject mutating calls, which is a deployment problem, not ours.
    #[serde(default)]
    pub master_key: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            master_key: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendSettings,
    #[serde(default = "default_reveal_cadence_ms")]
    pub reveal_cadence_ms: u64,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_reveal_cadence_ms() -> u64 {
    DEFAULT_REVEAL_CADENCE_MS
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            reveal_cadence_ms: DEFAULT_REVEAL_CADENCE_MS,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl AppConfig {
    /// Returns the data directory in the user's home, falling back to the
    /// working directory when no home is known.
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_DIRECTORY_NAME)
    }

    /// Loads configuration by merging defaults with the JSON file at `path`.
    ///
    /// A missing or unparsable file falls back to defaults with a warning;
    /// configuration problems must never keep the client from starting.
    pub fn load_or_default(path: &Path) -> Self {
        let figment =
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Json::file(path));

        match figment.extract::<AppConfig>() {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(
                    "failed to parse config from {:?}: {}. using defaults",
                    path,
                    error
                );
                AppConfig::default()
            }
        }
    }

    pub fn reveal_cadence(&self) -> Duration {
        Duration::from_millis(self.reveal_cadence_ms)
    }

    pub fn to_backend_config(&self) -> BackendConfig {
        let mut config = BackendConfig::new(&self.backend.base_url, &self.backend.master_key);
        config.request_timeout = Duration::from_millis(self.backend.request_timeout_ms);
        config
    }
}
