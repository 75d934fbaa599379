//! Shared data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One user's stored preferences row.
///
/// `updated_at` is absent only for the placeholder returned when the user has
/// never saved anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRecord {
    pub user_id: String,
    #[serde(default)]
    pub preferences: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PreferencesRecord {
    /// Placeholder for a user without a stored row.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            preferences: Map::new(),
            updated_at: None,
        }
    }
}

/// Save preferences request payload.
#[derive(Debug, Default, Deserialize)]
pub struct SavePreferencesRequest {
    #[serde(default)]
    pub preferences: Option<Value>,
}

/// Save preferences response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePreferencesResponse {
    pub message: String,
    pub preferences: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_record_has_no_timestamp() {
        let value = serde_json::to_value(PreferencesRecord::empty("auth0|u1")).unwrap();
        assert_eq!(value, json!({ "userId": "auth0|u1", "preferences": {} }));
    }

    #[test]
    fn test_save_request_defaults() {
        let request: SavePreferencesRequest = serde_json::from_str("{}").unwrap();
        assert!(request.preferences.is_none());

        let request: SavePreferencesRequest =
            serde_json::from_value(json!({ "preferences": { "fontSize": "large" } })).unwrap();
        assert_eq!(request.preferences, Some(json!({ "fontSize": "large" })));
    }
}
