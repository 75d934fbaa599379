//! HTTP client for the `/preferences` resource.
//!
//! Reads fail soft: any error while fetching is logged and reported as an
//! empty record, which callers cannot tell apart from "nothing saved yet".
//! Writes fail hard and hand the error back.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::model::{PreferencesEnvelope, PreferencesSnapshot, SaveRequest, UserPreferences};
use crate::session::{FileSessionStore, SessionStore};
use crate::{Error, Result};

/// Operations the sync coordinator needs from a preferences backend.
#[async_trait]
pub trait PreferencesApi: Send + Sync {
    /// Fetch the caller's full record.
    async fn get_preferences(&self) -> Result<PreferencesSnapshot>;

    /// Replace the caller's full record, returning the server's echo.
    async fn save_preferences(&self, preferences: &UserPreferences) -> Result<PreferencesSnapshot>;

    /// Fetch, merge one key, save.
    ///
    /// Two round trips with no version check: a write landing between the
    /// fetch and the save is overwritten.
    async fn update_preference(&self, key: &str, value: Value) -> Result<PreferencesSnapshot> {
        let current = self.get_preferences().await?;
        let updated = current.preferences.merged(key, value);
        self.save_preferences(&updated).await
    }
}

/// Client for the preferences REST resource.
pub struct PreferencesClient {
    http_client: reqwest::Client,
    url: String,
    session: Arc<dyn SessionStore>,
}

impl PreferencesClient {
    /// Create a client for `url` (the full `/preferences` URL).
    pub fn new(url: impl Into<String>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            url: url.into(),
            session,
        }
    }

    /// Create a client using a file-backed session.
    pub fn from_config(config: &ClientConfig) -> Self {
        let session = Arc::new(FileSessionStore::new(config.session_file.clone()));
        Self::new(config.preferences_url(), session)
    }

    pub fn session(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.session)
    }

    async fn fetch(&self) -> Result<PreferencesSnapshot> {
        let token = self.session.bearer_token()?;

        let response = self
            .http_client
            .get(&self.url)
            .bearer_auth(token)
            .header("content-type", "application/json")
            .send()
            .await?;

        let envelope: PreferencesEnvelope = check_status(response).await?.json().await?;
        Ok(envelope.into())
    }
}

/// Turn a non-success response into [`Error::Http`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Preferences API returned {}: {}", status, body);
    Err(Error::Http {
        status: status.as_u16(),
        status_text: status_text(status),
    })
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(String::from)
        .unwrap_or_else(|| status.as_str().to_string())
}

#[async_trait]
impl PreferencesApi for PreferencesClient {
    async fn get_preferences(&self) -> Result<PreferencesSnapshot> {
        match self.fetch().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!("Error fetching user preferences: {}", e);
                Ok(PreferencesSnapshot::default())
            }
        }
    }

    async fn save_preferences(&self, preferences: &UserPreferences) -> Result<PreferencesSnapshot> {
        let token = self.session.bearer_token()?;

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(token)
            .json(&SaveRequest { preferences })
            .send()
            .await?;

        let envelope: PreferencesEnvelope = check_status(response).await?.json().await?;
        let snapshot = PreferencesSnapshot::from(envelope);

        info!(
            "Saved {} preference keys (updated at {:?})",
            snapshot.preferences.as_map().len(),
            snapshot.updated_at
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned response per connection, in order, and hand back
    /// the raw requests that were received.
    async fn serve(responses: Vec<(u16, &'static str, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/preferences", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, reason, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);

                let response = format!(
                    "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });

        (url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn request_body(raw: &str) -> Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn client(url: &str) -> PreferencesClient {
        PreferencesClient::new(url, Arc::new(MemorySessionStore::signed_in("token-abc")))
    }

    #[tokio::test]
    async fn test_get_sends_bearer_and_parses_record() {
        let (url, server) = serve(vec![(
            200,
            "OK",
            json!({
                "userId": "auth0|writer",
                "preferences": { "theme": "dark", "notifications": { "email": false } },
                "updatedAt": "2026-10-18T09:30:00Z"
            })
            .to_string(),
        )])
        .await;

        let snapshot = client(&url).get_preferences().await.unwrap();
        assert_eq!(snapshot.preferences.get("theme"), Some(&json!("dark")));
        assert_eq!(snapshot.preferences.notifications().unwrap().email, Some(false));
        assert!(snapshot.updated_at.is_some());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/preferences "));
        assert!(requests[0]
            .to_ascii_lowercase()
            .contains("authorization: bearer token-abc"));
    }

    #[tokio::test]
    async fn test_get_failure_is_empty_record() {
        let (url, server) = serve(vec![(
            500,
            "Internal Server Error",
            json!({ "message": "Internal server error" }).to_string(),
        )])
        .await;

        let snapshot = client(&url).get_preferences().await.unwrap();
        assert_eq!(snapshot, PreferencesSnapshot::default());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_get_without_token_is_empty_record() {
        let client = PreferencesClient::new(
            "http://127.0.0.1:9/api/preferences",
            Arc::new(MemorySessionStore::new()),
        );
        assert_eq!(client.get_preferences().await.unwrap(), PreferencesSnapshot::default());
    }

    #[tokio::test]
    async fn test_save_posts_full_record() {
        let (url, server) = serve(vec![(
            200,
            "OK",
            json!({
                "message": "Preferences updated successfully",
                "preferences": { "fontSize": "large" },
                "updatedAt": "2026-10-18T09:30:00Z"
            })
            .to_string(),
        )])
        .await;

        let mut record = UserPreferences::new();
        record.insert("fontSize", json!("large"));
        let snapshot = client(&url).save_preferences(&record).await.unwrap();
        assert_eq!(snapshot.preferences, record);
        assert!(snapshot.updated_at.is_some());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/preferences "));
        assert_eq!(
            request_body(&requests[0]),
            json!({ "preferences": { "fontSize": "large" } })
        );
    }

    #[tokio::test]
    async fn test_save_failure_carries_status_text() {
        let (url, server) = serve(vec![(
            500,
            "Internal Server Error",
            json!({ "message": "Internal server error", "error": "connection reset" }).to_string(),
        )])
        .await;

        let err = client(&url)
            .save_preferences(&UserPreferences::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Http {
                status: 500,
                status_text: "Internal Server Error".to_string()
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_save_without_token_fails() {
        let client = PreferencesClient::new(
            "http://127.0.0.1:9/api/preferences",
            Arc::new(MemorySessionStore::new()),
        );
        let err = client.save_preferences(&UserPreferences::new()).await.unwrap_err();
        assert_eq!(err, Error::MissingToken);
    }

    #[tokio::test]
    async fn test_update_merges_into_fetched_record() {
        let (url, server) = serve(vec![
            (
                200,
                "OK",
                json!({
                    "userId": "auth0|writer",
                    "preferences": { "theme": "light", "editorMode": "basic" },
                    "updatedAt": "2026-10-18T09:30:00Z"
                })
                .to_string(),
            ),
            (
                200,
                "OK",
                json!({
                    "message": "Preferences updated successfully",
                    "preferences": { "theme": "dark", "editorMode": "basic" },
                    "updatedAt": "2026-10-18T09:31:00Z"
                })
                .to_string(),
            ),
        ])
        .await;

        let snapshot = client(&url)
            .update_preference("theme", json!("dark"))
            .await
            .unwrap();
        assert_eq!(snapshot.preferences.get("theme"), Some(&json!("dark")));

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            request_body(&requests[1]),
            json!({ "preferences": { "theme": "dark", "editorMode": "basic" } })
        );
    }
}
