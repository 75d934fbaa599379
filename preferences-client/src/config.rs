//! Client configuration.

use std::env;
use std::path::PathBuf;

use crate::{Error, Result};

const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Where the preferences API lives and where the session is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL; the client appends `/preferences`
    pub api_base_url: String,
    /// JSON file holding the signed-in session
    pub session_file: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("PREFERENCES_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "PREFERENCES_API_URL must be an http(s) URL: {}",
                api_base_url
            )));
        }

        let session_file = match lookup("CONTENTLY_SESSION_FILE") {
            Some(path) => PathBuf::from(path),
            None => lookup("HOME")
                .filter(|home| !home.is_empty())
                .map(|home| PathBuf::from(home).join(".contently").join("session.json"))
                .ok_or_else(|| {
                    Error::Config(
                        "CONTENTLY_SESSION_FILE is not set and HOME is unavailable".to_string(),
                    )
                })?,
        };

        Ok(Self {
            api_base_url,
            session_file,
        })
    }

    /// Full URL of the preferences resource.
    pub fn preferences_url(&self) -> String {
        format!("{}/preferences", self.api_base_url)
    }
}
