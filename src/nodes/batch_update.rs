use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    NgsiError, Result,
    config::GeType,
    model::Message,
    ngsi::{ActionType, Decoding, HttpMethod, RequestBuilder, codec},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, entities_of, finish, merge_config, options_for},
    runtime::NodeContext,
};

const FIELDS: [&str; 6] = ["actionType", "entities", "keyValues", "overrideMetadata", "forcedUpdate", "forbidden"];

/// Apply one action to many entities at once (`/v2/op/update`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchUpdateNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for BatchUpdateNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["config", "payload"] },
                "actionType": { "type": "string", "enum": ["append", "appendStrict", "update", "delete", "replace"] }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::BatchUpdate
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Orion)?;
        let scope = ctx.resolve_scope(msg);
        let config = merge_config(&json!({ "actionType": "append" }), &self.settings, self.mode, &msg.payload, &FIELDS)?;
        let action = config.action_type()?;
        if !matches!(action, ActionType::Append | ActionType::AppendStrict | ActionType::Update | ActionType::Delete | ActionType::Replace) {
            return Err(NgsiError::Config(format!("actionType '{}' not supported by batch update", action.as_ref())));
        }

        let entities = match self.mode {
            InputMode::Config => entities_of(&msg.payload),
            InputMode::Payload => config.get("entities").map(entities_of).unwrap_or_default(),
        };
        if entities.is_empty() {
            return Err(NgsiError::missing("entities"));
        }

        let forbidden = config.flag("forbidden");
        let key_values = config.flag("keyValues");
        let body = json!({
            "actionType": action.as_ref(),
            "entities": codec::encode_entities(&Value::Array(entities), forbidden, key_values),
        });
        let builder = RequestBuilder::new(HttpMethod::POST, &broker.service_url, "/v2/op/update")
            .options(&options_for(&config, &["keyValues", "overrideMetadata", "forcedUpdate"]))
            .json(body);

        let decoding = Decoding {
            forbidden,
            key_values,
            ..Default::default()
        };
        let reply = ctx.call(broker, builder, &scope, action, decoding).await?;
        finish(ctx, msg, &scope, reply, "batch update", None);
        Ok(Emit::Message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        nodes::{EntityNode, testing},
        ngsi::RequestBody,
        transport::HttpResponse,
    };

    #[tokio::test]
    async fn test_replace_with_forbidden_characters() {
        let entity = json!([{"id": "E1", "type": "Thing", "name": {"type": "Text", "value": "<abc>"}}]);
        let (ctx, transport, channel) = testing::context(GeType::Orion);

        // raw value on the wire: the broker refuses it
        transport.push(HttpResponse::new(400).with_body(json!({"error": "BadRequest", "description": "Invalid characters in attribute value"})));
        let plain = BatchUpdateNode::create(json!({"actionType": "replace"})).unwrap();
        let mut msg = Message::new(entity.clone());
        plain.run(&ctx, &mut msg).await.unwrap();
        assert_eq!(msg.status_code, Some(400));
        let requests = transport.requests();
        let Some(RequestBody::Json(body)) = &requests[0].body else { panic!("json body expected") };
        assert_eq!(body["entities"][0]["name"]["value"], json!("<abc>"));
        assert_eq!(channel.drain_logs()[1].content, "Details: Invalid characters in attribute value");

        // escaped value on the wire: accepted
        transport.push(HttpResponse::new(204));
        let escaped = BatchUpdateNode::create(json!({"actionType": "replace", "forbidden": true})).unwrap();
        let mut msg = Message::new(entity);
        escaped.run(&ctx, &mut msg).await.unwrap();
        assert_eq!(msg.status_code, Some(204));
        let requests = transport.requests();
        let request = &requests[1];
        assert_eq!(request.pathname, "/v2/op/update");
        let Some(RequestBody::Json(body)) = &request.body else { panic!("json body expected") };
        assert_eq!(body["actionType"], json!("replace"));
        let stored = body["entities"][0].clone();
        assert_eq!(stored["name"]["value"], json!("%3Cabc%3E"));

        // a plain read returns what the broker stored
        transport.push(HttpResponse::new(200).with_body(stored));
        let reader = EntityNode::create(json!({"actionType": "read", "id": "E1"})).unwrap();
        let mut msg = Message::default();
        reader.run(&ctx, &mut msg).await.unwrap();
        assert_eq!(msg.payload["name"]["value"], json!("%3Cabc%3E"));
    }

    #[tokio::test]
    async fn test_notification_payload() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(204));

        let node = BatchUpdateNode::create(json!({"actionType": "update", "keyValues": true})).unwrap();
        let mut msg = Message::new(json!({"subscriptionId": "s1", "data": [{"id": "E1", "type": "T", "a": 1}, {"id": "E2", "type": "T", "a": 2}]}));
        node.run(&ctx, &mut msg).await.unwrap();

        let requests = transport.requests();
        let request = &requests[0];
        assert_eq!(request.query_param("options"), Some("keyValues"));
        let Some(RequestBody::Json(body)) = &request.body else { panic!("json body expected") };
        assert_eq!(body["entities"].as_array().unwrap().len(), 2);
        assert_eq!(msg.status_code, Some(204));
    }

    #[tokio::test]
    async fn test_rejects_read() {
        let (ctx, _, _) = testing::context(GeType::Orion);
        let node = BatchUpdateNode::create(json!({"mode": "payload"})).unwrap();
        let mut msg = Message::new(json!({"actionType": "read", "entities": [{"id": "E1"}]}));
        assert!(node.run(&ctx, &mut msg).await.is_err());
    }

    #[tokio::test]
    async fn test_no_entities() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        let node = BatchUpdateNode::create(Value::Null).unwrap();
        let err = node.run(&ctx, &mut Message::new(json!([]))).await.unwrap_err();
        assert_eq!(err.to_string(), "entities not found");
        assert!(transport.requests().is_empty());
    }
}
