use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    Result,
    config::GeType,
    model::Message,
    ngsi::{ActionType, Decoding, HttpMethod, RequestBuilder},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, finish, list, merge_config},
    runtime::NodeContext,
};

const FIELDS: [&str; 3] = ["type", "values", "limit"];
const DEFAULT_LIMIT: u64 = 100;

/// Entity types known to the broker: all of them, or the attributes of one.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TypesNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(default)]
    streaming: bool,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for TypesNode {
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
                "values": { "type": "boolean" },
                "limit": { "type": ["integer", "string"] }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Types
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Orion)?;
        let scope = ctx.resolve_scope(msg);
        let mut config = merge_config(&json!({}), &self.settings, self.mode, &msg.payload, &FIELDS)?;
        if self.mode == InputMode::Config && config.get("type").is_none() {
            if let Value::String(entity_type) = &msg.payload {
                config.set("type", entity_type.as_str());
            }
        }

        if let Some(entity_type) = config.string("type") {
            let builder = RequestBuilder::new(HttpMethod::GET, &broker.service_url, "/v2/types").segment(&entity_type);
            let reply = ctx.call(broker, builder, &scope, ActionType::Read, Decoding::default()).await?;
            finish(ctx, msg, &scope, reply, "reading type", None);
            return Ok(Emit::Message);
        }

        let limit = config.number("limit")?.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
        let options: &[&str] = if config.flag("values") { &["count", "values"] } else { &["count"] };
        let request = |page: u64| RequestBuilder::new(HttpMethod::GET, &broker.service_url, "/v2/types").options(options).page(page, limit);

        list(ctx, broker, msg, &scope, &request, Decoding::default(), self.streaming, "reading types").await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{nodes::testing, transport::HttpResponse};

    #[tokio::test]
    async fn test_list_type_names() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(200).with_header("Fiware-Total-Count", "2").with_body(json!(["Room", "Car"])));

        let node = TypesNode::create(json!({"values": true})).unwrap();
        let mut msg = Message::default();
        node.run(&ctx, &mut msg).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.pathname, "/v2/types");
        assert_eq!(request.query_param("options"), Some("count,values"));
        assert_eq!(request.query_param("offset"), Some("0"));
        assert_eq!(msg.payload, json!(["Room", "Car"]));
        assert_eq!(msg.context.unwrap().fiware_total_count, Some(2));
    }

    #[tokio::test]
    async fn test_single_type_from_payload() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(200).with_body(json!({"attrs": {"temperature": {"types": ["Number"]}}, "count": 3})));

        let node = TypesNode::create(Value::Null).unwrap();
        let mut msg = Message::new("Room");
        node.run(&ctx, &mut msg).await.unwrap();

        assert_eq!(transport.requests()[0].pathname, "/v2/types/Room");
        assert_eq!(msg.payload["count"], json!(3));
        assert_eq!(msg.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_values_must_be_boolean() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        let node = TypesNode::create(json!({"mode": "payload"})).unwrap();
        let err = node.run(&ctx, &mut Message::new(json!({"values": "true"}))).await.unwrap_err();
        assert_eq!(err.to_string(), "values not boolean");
        assert!(transport.requests().is_empty());
    }
}
