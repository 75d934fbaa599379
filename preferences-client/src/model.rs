//! User preferences record and its typed views.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Well-known preference keys.
pub mod keys {
    pub const THEME: &str = "theme";
    pub const FONT_SIZE: &str = "fontSize";
    pub const EDITOR_MODE: &str = "editorMode";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const CONTENT_DISPLAY: &str = "contentDisplay";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    Basic,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultView {
    Grid,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Date,
    Title,
    Status,
}

/// Named notification switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_reminders: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_updates: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How content lists are shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_view: Option<DefaultView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_completed: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user's flat preferences record.
///
/// The record is kept as raw JSON so keys this client does not know about,
/// or values written by a newer client, survive a read-modify-write. The
/// typed accessors return `None` for absent or unrecognised values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserPreferences(Map<String, Value>);

impl UserPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw value for `key`, including falsy values like `false` or `0`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Typed value for `key`, `None` if absent or of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Serialize `value` and store it under `key`.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Copy of this record with `key` set to `value`.
    pub fn merged(&self, key: &str, value: Value) -> Self {
        let mut merged = self.clone();
        merged.insert(key, value);
        merged
    }

    pub fn theme(&self) -> Option<Theme> {
        self.get_as(keys::THEME)
    }

    pub fn font_size(&self) -> Option<FontSize> {
        self.get_as(keys::FONT_SIZE)
    }

    pub fn editor_mode(&self) -> Option<EditorMode> {
        self.get_as(keys::EDITOR_MODE)
    }

    pub fn notifications(&self) -> Option<NotificationSettings> {
        self.get_as(keys::NOTIFICATIONS)
    }

    pub fn content_display(&self) -> Option<ContentDisplay> {
        self.get_as(keys::CONTENT_DISPLAY)
    }
}

impl From<Map<String, Value>> for UserPreferences {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A record as last confirmed by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesSnapshot {
    pub preferences: UserPreferences,
    /// Server write time; `None` until the user saves for the first time
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response body of both `GET` and `POST /preferences`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreferencesEnvelope {
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<PreferencesEnvelope> for PreferencesSnapshot {
    fn from(envelope: PreferencesEnvelope) -> Self {
        Self {
            preferences: envelope.preferences.unwrap_or_default(),
            updated_at: envelope.updated_at,
        }
    }
}

/// Request body of `POST /preferences`.
#[derive(Debug, Serialize)]
pub(crate) struct SaveRequest<'a> {
    pub preferences: &'a UserPreferences,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prefs(value: Value) -> UserPreferences {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_typed_accessors() {
        let record = prefs(json!({
            "theme": "dark",
            "fontSize": "large",
            "editorMode": "advanced",
            "notifications": { "email": false, "contentReminders": true, "digest": "weekly" },
            "contentDisplay": { "defaultView": "grid", "sortBy": "title", "showCompleted": false }
        }));

        assert_eq!(record.theme(), Some(Theme::Dark));
        assert_eq!(record.font_size(), Some(FontSize::Large));
        assert_eq!(record.editor_mode(), Some(EditorMode::Advanced));

        let notifications = record.notifications().unwrap();
        assert_eq!(notifications.email, Some(false));
        assert_eq!(notifications.push, None);
        assert_eq!(notifications.content_reminders, Some(true));
        assert_eq!(notifications.extra["digest"], "weekly");

        let display = record.content_display().unwrap();
        assert_eq!(display.default_view, Some(DefaultView::Grid));
        assert_eq!(display.sort_by, Some(SortBy::Title));
        assert_eq!(display.show_completed, Some(false));
    }

    #[test]
    fn test_unknown_values_are_kept_but_not_typed() {
        let record = prefs(json!({ "theme": "sepia", "sidebarWidth": 280 }));

        assert_eq!(record.theme(), None);
        assert_eq!(record.get("theme"), Some(&json!("sepia")));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "theme": "sepia", "sidebarWidth": 280 })
        );
    }

    #[test]
    fn test_set_and_merge() {
        let mut record = UserPreferences::new();
        record.set(keys::THEME, Theme::System).unwrap();
        record
            .set(
                keys::CONTENT_DISPLAY,
                ContentDisplay {
                    sort_by: Some(SortBy::Status),
                    ..Default::default()
                },
            )
            .unwrap();

        let merged = record.merged(keys::FONT_SIZE, json!("small"));
        assert_eq!(record.font_size(), None);
        assert_eq!(merged.font_size(), Some(FontSize::Small));
        assert_eq!(merged.theme(), Some(Theme::System));
        assert_eq!(
            merged.get(keys::CONTENT_DISPLAY),
            Some(&json!({ "sortBy": "status" }))
        );
    }

    #[test]
    fn test_envelope_defaults_to_empty_record() {
        let envelope: PreferencesEnvelope =
            serde_json::from_value(json!({ "userId": "auth0|u1" })).unwrap();
        let snapshot = PreferencesSnapshot::from(envelope);
        assert!(snapshot.preferences.is_empty());
        assert!(snapshot.updated_at.is_none());

        let envelope: PreferencesEnvelope = serde_json::from_value(json!({
            "message": "Preferences updated successfully",
            "preferences": { "theme": "dark" },
            "updatedAt": "2026-10-18T09:30:00.123456Z"
        }))
        .unwrap();
        let snapshot = PreferencesSnapshot::from(envelope);
        assert_eq!(snapshot.preferences.theme(), Some(Theme::Dark));
        assert!(snapshot.updated_at.is_some());
    }
}
