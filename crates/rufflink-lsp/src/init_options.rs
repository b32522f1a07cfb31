//! Settings payloads sent by the client.
//!
//! The same shape arrives in `initializationOptions` and in
//! `workspace/didChangeConfiguration`:
//!
//! ```json
//! { "settings": [ { "workspace": "file:///repo", "lint": { "args": [] } } ],
//!   "globalSettings": { "logLevel": "info" } }
//! ```
//!
//! VS Code sends one `settings` entry per workspace folder. Other clients
//! send a single `settings` object, which then doubles as the global
//! defaults.

use rufflink_core::UserSettings;
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingsPayload {
    List(Vec<UserSettings>),
    Single(UserSettings),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializationOptions {
    pub settings: Option<SettingsPayload>,
    pub global_settings: Option<UserSettings>,
}

impl InitializationOptions {
    /// Parse a payload, falling back to defaults when it is malformed.
    pub fn parse(value: Option<JsonValue>) -> Self {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Self::default();
        };
        match serde_json::from_value(value) {
            Ok(options) => options,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed settings payload");
                Self::default()
            }
        }
    }

    /// Split into global defaults and per-workspace entries.
    pub fn into_parts(self) -> (Option<UserSettings>, Vec<UserSettings>) {
        let global = self.global_settings.filter(|g| !g.is_empty());
        match self.settings {
            Some(SettingsPayload::List(entries)) => (global, entries),
            Some(SettingsPayload::Single(single)) => {
                let global = global.or_else(|| Some(single.clone()));
                (global, vec![single])
            }
            None => (global, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rufflink_core::settings::LogLevel;
    use serde_json::json;

    #[test]
    fn test_list_payload() {
        let options = InitializationOptions::parse(Some(json!({
            "settings": [
                { "workspace": "file:///a", "lint": { "args": ["--line-length=100"] } },
                { "workspace": "file:///b" }
            ],
            "globalSettings": { "logLevel": "debug" }
        })));
        let (global, workspaces) = options.into_parts();
        assert_eq!(global.unwrap().log_level, Some(LogLevel::Debug));
        assert_eq!(workspaces.len(), 2);
        assert_eq!(
            workspaces[0].lint.as_ref().unwrap().args,
            Some(vec!["--line-length=100".to_string()])
        );
    }

    #[test]
    fn test_single_object_becomes_global() {
        let options = InitializationOptions::parse(Some(json!({
            "settings": { "organizeImports": false }
        })));
        let (global, workspaces) = options.into_parts();
        assert_eq!(global.unwrap().organize_imports, Some(false));
        assert_eq!(workspaces.len(), 1);
    }

    #[test]
    fn test_empty_global_is_ignored() {
        let options = InitializationOptions::parse(Some(json!({
            "settings": [],
            "globalSettings": {}
        })));
        let (global, workspaces) = options.into_parts();
        assert!(global.is_none());
        assert!(workspaces.is_empty());
    }

    #[test]
    fn test_malformed_payload_falls_back() {
        assert_eq!(
            InitializationOptions::parse(Some(json!({ "settings": 42 }))),
            InitializationOptions::default()
        );
        assert_eq!(InitializationOptions::parse(None), InitializationOptions::default());
        assert_eq!(
            InitializationOptions::parse(Some(JsonValue::Null)),
            InitializationOptions::default()
        );
    }
}
