//! Session storage holding the identity provider's access token.
//!
//! Lookups are synchronous: the token is read from local storage on every
//! request, never refreshed here. Signing in and out is the identity
//! provider's job; this module only persists what it hands over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

use crate::{Error, Result};

/// Source of the bearer token for the current session.
pub trait SessionStore: Send + Sync {
    /// Current bearer token, or [`Error::MissingToken`].
    fn bearer_token(&self) -> Result<String>;

    fn is_authenticated(&self) -> bool {
        self.bearer_token().is_ok()
    }
}

/// Persisted session as written by the sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn usable_token(self, now: DateTime<Utc>) -> Result<String> {
        if self.access_token.is_empty() {
            return Err(Error::MissingToken);
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                debug!("Stored session expired at {}", expires_at);
                return Err(Error::MissingToken);
            }
        }
        Ok(self.access_token)
    }
}

/// Session kept in a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a session, creating parent directories as needed.
    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Session(format!("{}: {}", parent.display(), e)))?;
        }
        let contents = serde_json::to_vec_pretty(session)?;
        fs::write(&self.path, contents)
            .map_err(|e| Error::Session(format!("{}: {}", self.path.display(), e)))
    }

    /// Forget the session; a missing file is already signed out.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Session(format!("{}: {}", self.path.display(), e))),
        }
    }

    fn load(&self) -> Result<StoredSession> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::MissingToken),
            Err(e) => return Err(Error::Session(format!("{}: {}", self.path.display(), e))),
        };
        serde_json::from_slice(&contents)
            .map_err(|e| Error::Session(format!("{}: {}", self.path.display(), e)))
    }
}

impl SessionStore for FileSessionStore {
    fn bearer_token(&self) -> Result<String> {
        self.load()?.usable_token(Utc::now())
    }
}

/// Session held in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: RwLock<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn sign_in(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }

    pub fn sign_out(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl SessionStore for MemorySessionStore {
    fn bearer_token(&self) -> Result<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or(Error::MissingToken)
    }
}
