//! Action types and the allowlist-driven action configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{NgsiError, Result};

/// Boolean flags that end up in the `options` query parameter.
pub const OPTION_FLAGS: [&str; 7] = ["keyValues", "upsert", "skipForwarding", "forcedUpdate", "flowControl", "append", "overrideMetadata"];

/// Keys that must hold a strict boolean whenever present.
pub const BOOLEAN_KEYS: [&str; 11] = [
    "keyValues",
    "upsert",
    "skipForwarding",
    "forcedUpdate",
    "flowControl",
    "append",
    "overrideMetadata",
    "forbidden",
    "values",
    "count",
    "valueOnly",
];

/// Keys copied verbatim into the query string of listing and filtering endpoints.
pub const QUERY_KEYS: [&str; 16] = [
    "type",
    "attrs",
    "metadata",
    "id",
    "idPattern",
    "typePattern",
    "q",
    "mq",
    "georel",
    "geometry",
    "coords",
    "maxDistance",
    "minDistance",
    "orderBy",
    "limit",
    "offset",
];

/// The logical operation requested by a message.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ActionType {
    Create,
    #[default]
    Read,
    Update,
    Upsert,
    Delete,
    Append,
    AppendStrict,
    Replace,
    /// read the bare value of one attribute
    Value,
    /// write the bare value of one attribute
    ValueUpdate,
}

impl ActionType {
    /// The only status code accepted as success for this action.
    pub fn success_status(&self) -> u16 {
        match self {
            ActionType::Create => 201,
            ActionType::Read | ActionType::Value => 200,
            ActionType::Update
            | ActionType::Upsert
            | ActionType::Delete
            | ActionType::Append
            | ActionType::AppendStrict
            | ActionType::Replace
            | ActionType::ValueUpdate => 204,
        }
    }

    /// Whether a successful response body carries entity data to decode.
    pub fn is_read(&self) -> bool {
        matches!(self, ActionType::Read | ActionType::Value)
    }
}

/// Merged option set of one node invocation.
///
/// Built from layers ordered low to high priority. Only allowlisted keys
/// are copied; `null` and blank strings never override a lower layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionConfig {
    fields: Map<String, Value>,
}

impl ActionConfig {
    pub fn merge(
        allowed: &[&str],
        layers: &[&Value],
    ) -> Result<Self> {
        let mut fields = Map::new();
        for layer in layers {
            let Value::Object(obj) = layer else {
                continue;
            };
            for key in allowed {
                match obj.get(*key) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(s)) if s.trim().is_empty() => {}
                    Some(value) => {
                        fields.insert(key.to_string(), value.clone());
                    }
                }
            }
        }

        let config = Self {
            fields,
        };
        Self::check_booleans(&config.fields)?;
        Ok(config)
    }

    /// Reject any declared boolean key holding something other than a boolean.
    pub fn check_booleans(fields: &Map<String, Value>) -> Result<()> {
        for key in BOOLEAN_KEYS {
            match fields.get(key) {
                None | Some(Value::Bool(_)) => {}
                Some(_) => return Err(NgsiError::Config(format!("{} not boolean", key))),
            }
        }
        Ok(())
    }

    pub fn action_type(&self) -> Result<ActionType> {
        match self.fields.get("actionType") {
            None => Ok(ActionType::default()),
            Some(Value::String(s)) => s.trim().parse::<ActionType>().map_err(|_| NgsiError::Config(format!("invalid actionType: {}", s))),
            Some(other) => Err(NgsiError::Config(format!("invalid actionType: {}", other))),
        }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(
        &mut self,
        key: &str,
        value: impl Into<Value>,
    ) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Trimmed, non-empty string form of a field. Numbers are stringified and
    /// string arrays joined with commas.
    pub fn string(
        &self,
        key: &str,
    ) -> Option<String> {
        let text = match self.fields.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(arr) => arr.iter().filter_map(|v| v.as_str()).map(str::trim).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(","),
            _ => return None,
        };
        if text.is_empty() { None } else { Some(text) }
    }

    /// Like [`string`](Self::string) but a missing value is a configuration error.
    pub fn require(
        &self,
        key: &str,
    ) -> Result<String> {
        self.string(key).ok_or_else(|| NgsiError::missing(key))
    }

    pub fn flag(
        &self,
        key: &str,
    ) -> bool {
        matches!(self.fields.get(key), Some(Value::Bool(true)))
    }

    /// Non-negative integer field, accepting numeric strings.
    pub fn number(
        &self,
        key: &str,
    ) -> Result<Option<u64>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| NgsiError::Config(format!("{} not a non-negative integer", key))),
            Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| NgsiError::Config(format!("{} not a non-negative integer", key))),
            Some(_) => Err(NgsiError::Config(format!("{} not a non-negative integer", key))),
        }
    }

    /// The option flags that are set, in declaration order.
    pub fn options(&self) -> Vec<&'static str> {
        OPTION_FLAGS.iter().copied().filter(|key| self.flag(key)).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const ALLOWED: [&str; 5] = ["actionType", "id", "type", "skipForwarding", "keyValues"];

    #[test]
    fn test_merge_priority() {
        let defaults = json!({"actionType": "read", "type": "Thing"});
        let config = json!({"id": "E1", "type": "Room"});
        let payload = json!({"id": "E2"});
        let merged = ActionConfig::merge(&ALLOWED, &[&defaults, &config, &payload]).unwrap();
        assert_eq!(merged.string("id").as_deref(), Some("E2"));
        assert_eq!(merged.string("type").as_deref(), Some("Room"));
        assert_eq!(merged.action_type().unwrap(), ActionType::Read);
    }

    #[test]
    fn test_merge_ignores_unknown_null_and_blank() {
        let config = json!({"id": "E1"});
        let payload = json!({"id": "  ", "type": null, "evil": "x"});
        let merged = ActionConfig::merge(&ALLOWED, &[&config, &payload]).unwrap();
        assert_eq!(merged.string("id").as_deref(), Some("E1"));
        assert_eq!(merged.get("type"), None);
        assert_eq!(merged.get("evil"), None);
    }

    #[test]
    fn test_non_boolean_option_rejected() {
        let config = json!({"actionType": "read", "id": "E1", "skipForwarding": "false"});
        let err = ActionConfig::merge(&ALLOWED, &[&config]).unwrap_err();
        assert_eq!(err, NgsiError::Config("skipForwarding not boolean".to_string()));
        assert_eq!(err.to_string(), "skipForwarding not boolean");
    }

    #[test]
    fn test_options_in_declaration_order() {
        let config = json!({"skipForwarding": true, "keyValues": true});
        let merged = ActionConfig::merge(&ALLOWED, &[&config]).unwrap();
        assert_eq!(merged.options(), vec!["keyValues", "skipForwarding"]);
    }

    #[test]
    fn test_string_forms() {
        let config = json!({"id": 42, "type": ["A", " B ", ""]});
        let merged = ActionConfig::merge(&ALLOWED, &[&config]).unwrap();
        assert_eq!(merged.string("id").as_deref(), Some("42"));
        assert_eq!(merged.string("type").as_deref(), Some("A,B"));
        assert_eq!(merged.require("actionType").unwrap_err().to_string(), "actionType not found");
    }

    #[test]
    fn test_action_type_parse() {
        let merged = ActionConfig::merge(&ALLOWED, &[&json!({"actionType": "appendStrict"})]).unwrap();
        assert_eq!(merged.action_type().unwrap(), ActionType::AppendStrict);

        let merged = ActionConfig::merge(&ALLOWED, &[&json!({"actionType": "explode"})]).unwrap();
        assert!(merged.action_type().is_err());
    }

    #[test]
    fn test_success_table() {
        assert_eq!(ActionType::Create.success_status(), 201);
        assert_eq!(ActionType::Upsert.success_status(), 204);
        assert_eq!(ActionType::Replace.success_status(), 204);
        assert_eq!(ActionType::Read.success_status(), 200);
        assert_eq!(ActionType::ValueUpdate.success_status(), 204);
    }
}
