use serde::{Deserialize, Serialize};

use crate::{NgsiError, Result, ngsi::ActionConfig};

/// NGSIv2 subscription document.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subject: Subject,
    pub notification: Notification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttling: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Subject {
    pub entities: Vec<EntitySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitySelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_pattern: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Expression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub georel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub http: HttpTarget,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except_attrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs_format: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_changed_attrs: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HttpTarget {
    pub url: String,
}

fn list(
    config: &ActionConfig,
    key: &str,
) -> Vec<String> {
    config.string(key).map(|s| s.split(',').map(str::trim).filter(|a| !a.is_empty()).map(str::to_string).collect()).unwrap_or_default()
}

impl Subscription {
    /// Build a subscription from flat node settings.
    ///
    /// `url` is required. Without `id` or `idPattern` every entity is watched.
    pub fn from_config(config: &ActionConfig) -> Result<Self> {
        let url = config.string("url").ok_or_else(|| NgsiError::missing("url"))?;

        let id = config.string("id");
        let selector = EntitySelector {
            id_pattern: if id.is_none() { Some(config.string("idPattern").unwrap_or_else(|| ".*".to_string())) } else { None },
            id,
            entity_type: config.string("type"),
        };

        let expression = Expression {
            q: config.string("q"),
            mq: config.string("mq"),
            georel: config.string("georel"),
            geometry: config.string("geometry"),
            coords: config.string("coords"),
        };
        let watched = list(config, "watchedAttrs");
        let condition = if watched.is_empty() && expression == Expression::default() {
            None
        } else {
            Some(Condition {
                attrs: watched,
                expression: if expression == Expression::default() { None } else { Some(expression) },
            })
        };

        Ok(Self {
            description: config.string("description"),
            subject: Subject {
                entities: vec![selector],
                condition,
            },
            notification: Notification {
                http: HttpTarget {
                    url,
                },
                attrs: list(config, "attrs"),
                except_attrs: list(config, "exceptAttrs"),
                attrs_format: config.string("attrsFormat"),
                metadata: list(config, "metadata"),
                only_changed_attrs: config.get("onlyChangedAttrs").and_then(|v| v.as_bool()),
            },
            expires: config.string("expires"),
            throttling: config.number("throttling")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const KEYS: [&str; 9] = ["url", "id", "idPattern", "type", "watchedAttrs", "q", "attrs", "attrsFormat", "throttling"];

    #[test]
    fn test_minimal_subscription() {
        let config = ActionConfig::merge(&KEYS, &[&json!({"url": "http://sink:1880/notify"})]).unwrap();
        let subscription = Subscription::from_config(&config).unwrap();
        assert_eq!(
            serde_json::to_value(&subscription).unwrap(),
            json!({
                "subject": {"entities": [{"idPattern": ".*"}]},
                "notification": {"http": {"url": "http://sink:1880/notify"}}
            })
        );
    }

    #[test]
    fn test_full_subscription() {
        let settings = json!({
            "url": "http://sink/notify",
            "id": "Room1",
            "type": "Room",
            "watchedAttrs": "temperature, pressure",
            "q": "temperature>40",
            "attrs": ["temperature"],
            "attrsFormat": "keyValues",
            "throttling": 5
        });
        let config = ActionConfig::merge(&KEYS, &[&settings]).unwrap();
        let value = serde_json::to_value(Subscription::from_config(&config).unwrap()).unwrap();
        assert_eq!(value["subject"]["entities"][0], json!({"id": "Room1", "type": "Room"}));
        assert_eq!(value["subject"]["condition"], json!({"attrs": ["temperature", "pressure"], "expression": {"q": "temperature>40"}}));
        assert_eq!(value["notification"]["attrs"], json!(["temperature"]));
        assert_eq!(value["notification"]["attrsFormat"], json!("keyValues"));
        assert_eq!(value["throttling"], json!(5));
    }

    #[test]
    fn test_url_required() {
        let config = ActionConfig::merge(&KEYS, &[&json!({"id": "Room1"})]).unwrap();
        assert_eq!(Subscription::from_config(&config).unwrap_err().to_string(), "url not found");
    }
}
