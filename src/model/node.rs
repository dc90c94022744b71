use serde::{Deserialize, Serialize};

use crate::{NgsiError, Result};

/// Static definition of one node instance, as handed over by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// node type, eg. `entity`, `source`, `to-worldmap`
    pub uses: String,
    /// name of the broker in [`Config`](crate::Config), required by nodes that call a service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker: Option<String>,
    /// default `Fiware-Service` when the message carries none
    #[serde(default)]
    pub service: String,
    /// default `Fiware-ServicePath` when the message carries none
    #[serde(default)]
    pub service_path: String,
    /// node type specific settings
    #[serde(default)]
    pub action: serde_json::Value,
}

impl NodeModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<NodeModel>(s).map_err(|e| NgsiError::Node(format!("invalid node model: {}", e)))
    }
}
