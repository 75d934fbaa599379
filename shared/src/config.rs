//! Configuration management for Lambda functions.

use std::env;

use crate::{Error, Result};

/// Default table backing the preferences store.
pub const DEFAULT_PREFERENCES_TABLE: &str = "user_preferences";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host
    pub db_host: String,
    /// Database name
    pub db_name: String,
    /// ARN of the secret containing database credentials
    pub db_secret_arn: String,
    /// Table holding one preferences row per user
    pub preferences_table: String,
    /// Value sent in `Access-Control-Allow-Origin`
    pub cors_allow_origin: String,
    /// AWS region
    pub aws_region: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::Config(format!("{} not set", key)))
        };

        let preferences_table = lookup("PREFERENCES_TABLE")
            .unwrap_or_else(|| DEFAULT_PREFERENCES_TABLE.to_string());
        if !is_valid_table_name(&preferences_table) {
            return Err(Error::Config(format!(
                "PREFERENCES_TABLE is not a valid identifier: {}",
                preferences_table
            )));
        }

        Ok(Self {
            db_host: required("DB_HOST")?,
            db_name: lookup("DB_NAME").unwrap_or_else(|| "contently".to_string()),
            db_secret_arn: required("DB_SECRET_ARN")?,
            preferences_table,
            cors_allow_origin: lookup("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".to_string()),
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        })
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed.
fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DB_HOST", "db.internal"),
            ("DB_SECRET_ARN", "arn:aws:secretsmanager:us-east-1:123:secret:db"),
        ]))
        .unwrap();

        assert_eq!(config.db_name, "contently");
        assert_eq!(config.preferences_table, DEFAULT_PREFERENCES_TABLE);
        assert_eq!(config.cors_allow_origin, "*");
        assert_eq!(config.aws_region, "us-east-1");
    }

    #[test]
    fn test_missing_required_key() {
        let err = Config::from_lookup(lookup_from(&[("DB_HOST", "db.internal")])).unwrap_err();
        assert!(err.to_string().contains("DB_SECRET_ARN not set"));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let err = Config::from_lookup(lookup_from(&[
            ("DB_HOST", "db.internal"),
            ("DB_SECRET_ARN", "arn"),
            ("PREFERENCES_TABLE", "prefs; DROP TABLE users"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
