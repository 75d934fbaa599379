//! Session-scoped preferences state with optimistic updates.
//!
//! The coordinator owns the in-memory record for one signed-in session.
//! Writes are applied locally first, then replaced by whatever the server
//! echoes back. A failed write records the error, reloads from the server
//! once, and returns the error to the caller.
//!
//! Every request takes a sequence number. Whole-record requests (load, save)
//! and single-key updates track their own latest sequence; a response is
//! applied only while it is still the latest for its scope, and a key update
//! is also superseded by any whole-record request issued after it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::client::PreferencesApi;
use crate::model::{PreferencesSnapshot, UserPreferences};
use crate::session::SessionStore;
use crate::{Error, Result};

/// Where the session's preferences stand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Not signed in; the record is empty.
    Idle,
    /// A request is in flight.
    Loading,
    /// The record matches the last successful fetch or write.
    Loaded,
    /// The last fetch or write failed.
    Error(Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    Record,
    Key(String),
}

struct Ticket {
    seq: u64,
    scope: Scope,
}

struct Inner {
    state: SyncState,
    preferences: UserPreferences,
    updated_at: Option<DateTime<Utc>>,
    next_seq: u64,
    latest_record: u64,
    latest_by_key: HashMap<String, u64>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: SyncState::Idle,
            preferences: UserPreferences::default(),
            updated_at: None,
            next_seq: 0,
            latest_record: 0,
            latest_by_key: HashMap::new(),
        }
    }

    fn issue(&mut self, scope: Scope) -> Ticket {
        self.next_seq += 1;
        let seq = self.next_seq;
        match &scope {
            Scope::Record => self.latest_record = seq,
            Scope::Key(key) => {
                self.latest_by_key.insert(key.clone(), seq);
            }
        }
        Ticket { seq, scope }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        match &ticket.scope {
            Scope::Record => self.latest_record == ticket.seq,
            Scope::Key(key) => {
                self.latest_by_key.get(key) == Some(&ticket.seq) && self.latest_record < ticket.seq
            }
        }
    }

    /// Back to Idle; everything in flight becomes stale.
    fn reset(&mut self) {
        self.next_seq += 1;
        self.latest_record = self.next_seq;
        self.latest_by_key.clear();
        self.state = SyncState::Idle;
        self.preferences = UserPreferences::default();
        self.updated_at = None;
    }

    fn apply(&mut self, snapshot: PreferencesSnapshot) {
        self.preferences = snapshot.preferences;
        self.updated_at = snapshot.updated_at;
    }
}

/// Preferences state for one session.
pub struct PreferencesSync {
    api: Arc<dyn PreferencesApi>,
    session: Arc<dyn SessionStore>,
    inner: Mutex<Inner>,
}

impl PreferencesSync {
    /// Create an idle coordinator; call [`mount`](Self::mount) to load.
    pub fn new(api: Arc<dyn PreferencesApi>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            api,
            session,
            inner: Mutex::new(Inner::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load if signed in, otherwise reset to Idle.
    pub async fn mount(&self) {
        self.sync_auth().await;
    }

    /// Re-evaluate the session after a sign-in or sign-out.
    pub async fn sync_auth(&self) {
        if self.session.is_authenticated() {
            self.load().await;
        } else {
            debug!("Session not authenticated, resetting preferences");
            self.lock().reset();
        }
    }

    /// Fetch the full record and replace local state.
    ///
    /// Failures are recorded in the state, never returned.
    pub async fn load(&self) {
        self.load_inner(true).await;
    }

    /// Same as [`load`](Self::load).
    pub async fn reload(&self) {
        self.load().await;
    }

    async fn load_inner(&self, clear_error: bool) {
        if !self.session.is_authenticated() {
            return;
        }

        let ticket = {
            let mut inner = self.lock();
            if clear_error || !matches!(inner.state, SyncState::Error(_)) {
                inner.state = SyncState::Loading;
            }
            inner.issue(Scope::Record)
        };

        let result = self.api.get_preferences().await;

        let mut inner = self.lock();
        if !inner.is_current(&ticket) {
            debug!("Discarding stale preferences load #{}", ticket.seq);
            return;
        }

        let keep_error = !clear_error && matches!(inner.state, SyncState::Error(_));
        match result {
            Ok(snapshot) => {
                inner.apply(snapshot);
                if !keep_error {
                    inner.state = SyncState::Loaded;
                }
            }
            Err(e) => {
                error!("Error loading preferences: {}", e);
                if !keep_error {
                    inner.state = SyncState::Error(e);
                }
            }
        }
    }

    /// Set one key optimistically, then persist it.
    ///
    /// Returns `Ok(None)` without doing anything when signed out.
    pub async fn update_preference(
        &self,
        key: &str,
        value: Value,
    ) -> Result<Option<PreferencesSnapshot>> {
        if !self.session.is_authenticated() {
            return Ok(None);
        }

        let ticket = {
            let mut inner = self.lock();
            inner.state = SyncState::Loading;
            inner.preferences.insert(key, value.clone());
            inner.issue(Scope::Key(key.to_string()))
        };

        let result = self.api.update_preference(key, value).await;
        self.finish_write(ticket, result, &format!("preference {}", key))
            .await
    }

    /// Replace the whole record optimistically, then persist it.
    ///
    /// Returns `Ok(None)` without doing anything when signed out.
    pub async fn save_preferences(
        &self,
        preferences: UserPreferences,
    ) -> Result<Option<PreferencesSnapshot>> {
        if !self.session.is_authenticated() {
            return Ok(None);
        }

        let ticket = {
            let mut inner = self.lock();
            inner.state = SyncState::Loading;
            inner.preferences = preferences.clone();
            inner.issue(Scope::Record)
        };

        let result = self.api.save_preferences(&preferences).await;
        self.finish_write(ticket, result, "preferences").await
    }

    async fn finish_write(
        &self,
        ticket: Ticket,
        result: Result<PreferencesSnapshot>,
        what: &str,
    ) -> Result<Option<PreferencesSnapshot>> {
        match result {
            Ok(snapshot) => {
                let mut inner = self.lock();
                if inner.is_current(&ticket) {
                    inner.apply(snapshot.clone());
                    inner.state = SyncState::Loaded;
                    info!("Saved {}", what);
                } else {
                    debug!("Discarding stale response for {} (#{})", what, ticket.seq);
                }
                Ok(Some(snapshot))
            }
            Err(e) => {
                error!("Error saving {}: {}", what, e);
                {
                    let mut inner = self.lock();
                    if inner.latest_record > ticket.seq && !self.session.is_authenticated() {
                        debug!("Session ended while saving {} (#{})", what, ticket.seq);
                        return Err(e);
                    }
                    inner.state = SyncState::Error(e.clone());
                }

                // Put the local view back in line with the server.
                self.load_inner(false).await;
                Err(e)
            }
        }
    }

    /// Stored value for `key`, or `default` when absent or of another shape.
    pub fn get_preference<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let inner = self.lock();
        match inner.preferences.get(key) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                debug!("Preference {} has unexpected shape: {}", key, e);
                default
            }),
            None => default,
        }
    }

    pub fn preferences(&self) -> UserPreferences {
        self.lock().preferences.clone()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.lock().updated_at
    }

    pub fn state(&self) -> SyncState {
        self.lock().state.clone()
    }

    pub fn loading(&self) -> bool {
        matches!(self.lock().state, SyncState::Loading)
    }

    pub fn error(&self) -> Option<Error> {
        match &self.lock().state {
            SyncState::Error(e) => Some(e.clone()),
            _ => None,
        }
    }
}
