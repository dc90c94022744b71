use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    Result,
    config::GeType,
    model::Message,
    ngsi::{Decoding, HttpMethod, QUERY_KEYS, RequestBuilder},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, list, merge_config},
    runtime::NodeContext,
};

const DEFAULT_LIMIT: u64 = 100;

/// List entities matching a query, following `fiware-total-count` across pages.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceNode {
    #[serde(default)]
    mode: InputMode,
    /// one message per page instead of a single array
    #[serde(default)]
    streaming: bool,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

fn fields() -> Vec<&'static str> {
    let mut fields = QUERY_KEYS.to_vec();
    fields.extend(["keyValues", "forbidden"]);
    fields
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for SourceNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["config", "payload"] },
                "streaming": { "type": "boolean" },
                "type": { "type": "string" },
                "idPattern": { "type": "string" },
                "q": { "type": "string" },
                "limit": { "type": ["integer", "string"] }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Source
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Orion)?;
        let scope = ctx.resolve_scope(msg);
        let mut config = merge_config(&json!({}), &self.settings, self.mode, &msg.payload, &fields())?;
        if config.get("id").is_none() && config.get("idPattern").is_none() {
            config.set("idPattern", ".*");
        }
        let limit = config.number("limit")?.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
        let decoding = Decoding {
            forbidden: config.flag("forbidden"),
            key_values: config.flag("keyValues"),
            ..Default::default()
        };
        let options: &[&str] = if decoding.key_values { &["count", "keyValues"] } else { &["count"] };

        let keys: Vec<&str> = QUERY_KEYS.iter().copied().filter(|k| *k != "limit" && *k != "offset").collect();
        let request = |page: u64| RequestBuilder::new(HttpMethod::GET, &broker.service_url, "/v2/entities").query_from(&config, &keys).options(options).page(page, limit);

        list(ctx, broker, msg, &scope, &request, decoding, self.streaming, "reading entities").await
    }
}
