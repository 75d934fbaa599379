//! Shared library for the Contently preferences Lambda functions.
//!
//! This crate provides configuration, caller identity, HTTP helpers and the
//! preferences table used by the Lambda handlers.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod secrets;
pub mod store;

pub use auth::{extract_user_from_context, AuthenticatedUser};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{PreferencesRecord, SavePreferencesRequest, SavePreferencesResponse};
pub use secrets::{get_database_credentials, get_secret, DatabaseCredentials};
pub use store::{MemoryPreferencesStore, PgPreferencesStore, PreferencesStore};
