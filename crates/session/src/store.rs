use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("failed to create session directory at {path}"))]
    CreateSessionDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to read session file from {path}"))]
    ReadSessionFile {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to write session file to {path}"))]
    WriteSessionFile {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to remove session file at {path}"))]
    RemoveSessionFile {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse session timestamp '{raw}'"))]
    ParseEstablishedAt {
        stage: &'static str,
        raw: String,
        source: ParseIntError,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// The two durable keys: who is signed in, and since when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub user_id: String,
    /// Epoch milliseconds at login/signup time.
    pub established_at_ms: u64,
}

/// Injected persistence port for the session keys.
///
/// Read once at startup, written on login/signup, cleared on logout or on
/// detected expiry.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> SessionResult<Option<PersistedSession>>;
    fn save(&self, session: &PersistedSession) -> SessionResult<()>;
    fn clear(&self) -> SessionResult<()>;
}

/// File-backed store using a small key=value file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> SessionResult<Option<PersistedSession>> {
        let mut user_id = None;
        let mut established_at_ms = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "user_id" => user_id = Some(value.trim().to_string()),
                    "established_at_ms" => {
                        let raw = value.trim();
                        let parsed = raw.parse::<u64>().context(ParseEstablishedAtSnafu {
                            stage: "parse-session-established-at",
                            raw: raw.to_string(),
                        })?;
                        established_at_ms = Some(parsed);
                    }
                    _ => {}
                }
            }
        }

        match (user_id, established_at_ms) {
            (Some(user_id), Some(established_at_ms)) if !user_id.is_empty() => {
                Ok(Some(PersistedSession {
                    user_id,
                    established_at_ms,
                }))
            }
            _ => Ok(None),
        }
    }

    fn format(session: &PersistedSession) -> String {
        format!(
            "# FinCoach session\nuser_id={}\nestablished_at_ms={}\n",
            session.user_id, session.established_at_ms
        )
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> SessionResult<Option<PersistedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).context(ReadSessionFileSnafu {
            stage: "read-session-file",
            path: self.display_path(),
        })?;

        Self::parse(&content)
    }

    fn save(&self, session: &PersistedSession) -> SessionResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateSessionDirectorySnafu {
                stage: "create-session-directory",
                path: parent.display().to_string(),
            })?;
        }

        std::fs::write(&self.path, Self::format(session)).context(WriteSessionFileSnafu {
            stage: "write-session-file",
            path: self.display_path(),
        })
    }

    fn clear(&self) -> SessionResult<()> {
        if !self.path.exists() {
            return Ok(());
        }

        std::fs::remove_file(&self.path).context(RemoveSessionFileSnafu {
            stage: "remove-session-file",
            path: self.display_path(),
        })
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(session: PersistedSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> SessionResult<Option<PersistedSession>> {
        Ok(self.session.lock().expect("session store poisoned").clone())
    }

    fn save(&self, session: &PersistedSession) -> SessionResult<()> {
        *self.session.lock().expect("session store poisoned") = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> SessionResult<()> {
        *self.session.lock().expect("session store poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_both_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.conf"));

        assert_eq!(store.load().unwrap(), None);

        let session = PersistedSession {
            user_id: "ada".to_string(),
            established_at_ms: 1_700_000_000_000,
        };
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice must stay a no-op.
        store.clear().unwrap();
    }

    #[test]
    fn file_store_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.conf"));

        store
            .save(&PersistedSession {
                user_id: "ada".to_string(),
                established_at_ms: 1,
            })
            .unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn partial_file_loads_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.conf");
        std::fs::write(&path, "user_id=ada\n").unwrap();

        let store = FileSessionStore::new(path);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn garbage_timestamp_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.conf");
        std::fs::write(&path, "user_id=ada\nestablished_at_ms=yesterday\n").unwrap();

        let store = FileSessionStore::new(path);
        let error = store.load().unwrap_err();
        assert!(matches!(error, SessionError::ParseEstablishedAt { .. }));
    }
}
