use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message flowing between nodes.
///
/// Fields the nodes do not know about are kept in `extra` and written back
/// unchanged, so upstream properties such as `topic` survive a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(rename = "_msgid", default = "new_msgid")]
    pub msgid: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<FiwareContext>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// FIWARE tenant scope carried across node invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FiwareContext {
    #[serde(default)]
    pub fiware_service: Option<String>,
    #[serde(default)]
    pub fiware_service_path: Option<String>,
    #[serde(default)]
    pub fiware_total_count: Option<u64>,
}

fn new_msgid() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl Message {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            msgid: new_msgid(),
            payload: payload.into(),
            status_code: None,
            context: None,
            extra: Map::new(),
        }
    }

    pub fn with_context(
        mut self,
        service: &str,
        service_path: &str,
    ) -> Self {
        self.context = Some(FiwareContext {
            fiware_service: Some(service.to_string()),
            fiware_service_path: Some(service_path.to_string()),
            fiware_total_count: None,
        });
        self
    }

    /// A copy of this message carrying a different payload, used when one
    /// input produces several outputs.
    pub fn derive(
        &self,
        payload: impl Into<Value>,
    ) -> Self {
        Self {
            msgid: self.msgid.clone(),
            payload: payload.into(),
            status_code: self.status_code,
            context: self.context.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Replace the payload with `{ "error": message }` and a synthetic 500.
    pub fn set_error(
        &mut self,
        message: &str,
    ) {
        self.payload = serde_json::json!({ "error": message });
        self.status_code = Some(500);
    }

    pub fn from_json(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str::<Message>(s)?)
    }

    pub fn to_json(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
