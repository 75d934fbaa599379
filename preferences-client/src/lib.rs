//! Client side of the Contently preferences flow.
//!
//! [`PreferencesClient`] talks to the `/preferences` resource,
//! [`PreferencesSync`] keeps one session's record in memory and applies
//! updates optimistically on top of it.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod session;
pub mod sync;

pub use client::{PreferencesApi, PreferencesClient};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use model::{
    ContentDisplay, DefaultView, EditorMode, FontSize, NotificationSettings, PreferencesSnapshot,
    SortBy, Theme, UserPreferences,
};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, StoredSession};
pub use sync::{PreferencesSync, SyncState};
