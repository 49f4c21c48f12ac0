//! Role permission documents, the administrative input that expands into
//! permission facts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::object_type::ObjectType;

/// One group of toggled actions inside a permission document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ActionEntry {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub group_key: Option<String>,
    /// action key -> enabled
    #[serde(default)]
    pub action_map: BTreeMap<String, bool>,
}

impl ActionEntry {
    pub fn enabled<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ActionEntry {
            action_map: keys.into_iter().map(|k| (k.into(), true)).collect(),
            ..Default::default()
        }
    }

    pub fn enabled_keys(&self) -> impl Iterator<Item = &str> {
        self.action_map
            .iter()
            .filter(|(_, on)| **on)
            .map(|(k, _)| k.as_str())
    }
}

/// The object-scoped permissions one role holds on one object.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PermissionDocument {
    pub role_id: String,
    pub action_type: ObjectType,
    pub object_id: String,
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

impl PermissionDocument {
    pub fn new<R: Into<String>, O: Into<String>>(
        role_id: R,
        action_type: ObjectType,
        object_id: O,
        actions: Vec<ActionEntry>,
    ) -> Self {
        PermissionDocument {
            role_id: role_id.into(),
            action_type,
            object_id: object_id.into(),
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_keys_skip_disabled_actions() {
        let mut entry = ActionEntry::enabled(["read", "insert"]);
        entry.action_map.insert("delete".into(), false);
        let keys: Vec<&str> = entry.enabled_keys().collect();
        assert_eq!(keys, vec!["insert", "read"]);
    }

    #[test]
    fn test_document_deserialization() {
        let json = serde_json::json!({
            "role_id": "r1",
            "action_type": "datastore",
            "object_id": "D",
            "actions": [{ "api_key": "read", "action_map": { "read": true, "delete": false } }]
        });
        let doc: PermissionDocument = serde_json::from_value(json).unwrap();
        assert_eq!(doc.action_type, ObjectType::Datastore);
        assert_eq!(doc.actions[0].api_key.as_deref(), Some("read"));
        assert_eq!(doc.actions[0].enabled_keys().collect::<Vec<_>>(), vec!["read"]);
    }
}
