use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    NgsiError, Result,
    config::GeType,
    model::Message,
    ngsi::{ActionType, Decoding, HttpMethod, RequestBuilder, codec},
    nodes::{Emit, InputMode, NgsiNode, NodeType, attributes_of, create_from, finish, merge_config, options_for, payload_id},
    runtime::NodeContext,
};

const FIELDS: [&str; 15] = [
    "actionType",
    "id",
    "type",
    "attrs",
    "metadata",
    "entity",
    "attributes",
    "keyValues",
    "upsert",
    "skipForwarding",
    "forcedUpdate",
    "flowControl",
    "overrideMetadata",
    "append",
    "forbidden",
];

/// Create, read, update or delete one entity on Orion.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EntityNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

impl EntityNode {
    fn defaults() -> Value {
        json!({ "actionType": "read" })
    }

    /// Request body: `entity` / `attributes` in payload mode, the payload itself otherwise.
    fn body(
        &self,
        config_body: Option<&Value>,
        payload: &Value,
    ) -> Option<Value> {
        match self.mode {
            InputMode::Payload => config_body.cloned(),
            InputMode::Config => Some(payload.clone()).filter(|p| p.is_object() || p.is_array()),
        }
    }
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for EntityNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["config", "payload"] },
                "actionType": {
                    "type": "string",
                    "enum": ["create", "upsert", "read", "update", "append", "replace", "delete"]
                },
                "id": { "type": "string" },
                "type": { "type": "string" },
                "attrs": { "type": ["string", "array"] },
                "metadata": { "type": ["string", "array"] }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Entity
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Orion)?;
        let scope = ctx.resolve_scope(msg);
        let config = merge_config(&Self::defaults(), &self.settings, self.mode, &msg.payload, &FIELDS)?;
        let action = config.action_type()?;
        let forbidden = config.flag("forbidden");
        let key_values = config.flag("keyValues");

        let entities = RequestBuilder::new(HttpMethod::GET, &broker.service_url, "/v2/entities");
        let id = || -> Result<String> { config.string("id").or_else(|| payload_id(&msg.payload)).ok_or_else(|| NgsiError::missing("id")) };

        let builder = match action {
            ActionType::Create | ActionType::Upsert => {
                let entity = self.body(config.get("entity"), &msg.payload).ok_or_else(|| NgsiError::missing("entity"))?;
                let mut options = options_for(&config, &["keyValues", "upsert"]);
                if action == ActionType::Upsert && !options.contains(&"upsert") {
                    options.push("upsert");
                }
                RequestBuilder::new(HttpMethod::POST, &broker.service_url, "/v2/entities")
                    .options(&options)
                    .json(codec::encode_entities(&entity, forbidden, key_values))
            }
            ActionType::Read => entities.segment(&id()?).query_from(&config, &["type", "attrs", "metadata"]).options(&options_for(&config, &["keyValues", "skipForwarding"])),
            ActionType::Update | ActionType::Append | ActionType::Replace => {
                let id = id()?;
                let attrs = self.body(config.get("attributes"), &msg.payload).map(|b| attributes_of(&b)).ok_or_else(|| NgsiError::missing("attributes"))?;
                let (method, allowed): (HttpMethod, &[&'static str]) = match action {
                    ActionType::Update => (HttpMethod::PATCH, &["keyValues", "forcedUpdate", "flowControl", "overrideMetadata"]),
                    ActionType::Append => (HttpMethod::POST, &["keyValues", "append", "forcedUpdate", "flowControl", "overrideMetadata"]),
                    _ => (HttpMethod::PUT, &["keyValues", "forcedUpdate", "flowControl"]),
                };
                RequestBuilder::new(method, &broker.service_url, "/v2/entities")
                    .segment(&id)
                    .segment("attrs")
                    .query_from(&config, &["type"])
                    .options(&options_for(&config, allowed))
                    .json(codec::encode_attributes(&attrs, forbidden, key_values))
            }
            ActionType::Delete => RequestBuilder::new(HttpMethod::DELETE, &broker.service_url, "/v2/entities").segment(&id()?).query_from(&config, &["type"]),
            other => return Err(NgsiError::Config(format!("actionType '{}' not supported by entity node", other.as_ref()))),
        };

        let reply = ctx
            .call(
                broker,
                builder,
                &scope,
                action,
                Decoding {
                    forbidden,
                    key_values,
                    ..Default::default()
                },
            )
            .await?;
        finish(ctx, msg, &scope, reply, &format!("{} entity", action.as_ref()), None);
        Ok(Emit::Message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        ngsi::RequestBody,
        nodes::testing,
        transport::HttpResponse,
    };

    #[tokio::test]
    async fn test_read_entity() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(200).with_body(json!({"id": "E1", "type": "Thing", "name": {"type": "Text", "value": "%3Cabc%3E"}})));

        let node = EntityNode::create(json!({"actionType": "read", "type": "Thing", "keyValues": false, "forbidden": true})).unwrap();
        let mut msg = Message::new("E1");
        assert_eq!(node.run(&ctx, &mut msg).await.unwrap(), Emit::Message);

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::GET);
        assert_eq!(request.url(), "http://localhost:1026/v2/entities/E1");
        assert_eq!(request.query_param("type"), Some("Thing"));
        assert_eq!(request.query_param("options"), None);
        assert_eq!(request.header("Fiware-Service"), Some("openiot"));
        assert_eq!(request.header("Fiware-ServicePath"), Some("/"));

        assert_eq!(msg.status_code, Some(200));
        assert_eq!(msg.payload["name"]["value"], json!("<abc>"));
        assert_eq!(msg.context.unwrap().fiware_service.as_deref(), Some("openiot"));
    }

    #[tokio::test]
    async fn test_payload_mode_non_boolean_option() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        let node = EntityNode::create(json!({"mode": "payload"})).unwrap();
        let mut msg = Message::new(json!({"actionType": "read", "id": "E1", "skipForwarding": "false"}));

        let err = node.run(&ctx, &mut msg).await.unwrap_err();
        assert_eq!(err.to_string(), "skipForwarding not boolean");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_entity_encodes_values() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(201).with_header("Location", "/v2/entities/E1?type=Thing"));

        let node = EntityNode::create(json!({"actionType": "create", "forbidden": true})).unwrap();
        let mut msg = Message::new(json!({"id": "E1", "type": "Thing", "name": {"type": "Text", "value": "(x)"}}));
        node.run(&ctx, &mut msg).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::POST);
        assert_eq!(request.pathname, "/v2/entities");
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body, Some(RequestBody::Json(json!({"id": "E1", "type": "Thing", "name": {"type": "Text", "value": "%28x%29"}}))));
        assert_eq!(msg.status_code, Some(201));
        assert_eq!(msg.payload, Value::Null);
    }

    #[tokio::test]
    async fn test_upsert_adds_option() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(204));

        let node = EntityNode::create(json!({"actionType": "upsert", "keyValues": true})).unwrap();
        let mut msg = Message::new(json!({"id": "E1", "type": "Thing", "temperature": 21}));
        node.run(&ctx, &mut msg).await.unwrap();

        assert_eq!(transport.requests()[0].query_param("options"), Some("keyValues,upsert"));
        assert_eq!(msg.status_code, Some(204));
    }

    #[tokio::test]
    async fn test_update_strips_id_and_type() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(204));

        let node = EntityNode::create(json!({"actionType": "update", "forcedUpdate": true})).unwrap();
        let mut msg = Message::new(json!({"id": "E1", "type": "Thing", "temperature": {"value": 21}}));
        node.run(&ctx, &mut msg).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::PATCH);
        assert_eq!(request.pathname, "/v2/entities/E1/attrs");
        assert_eq!(request.query_param("options"), Some("forcedUpdate"));
        assert_eq!(request.body, Some(RequestBody::Json(json!({"temperature": {"value": 21}}))));
    }

    #[tokio::test]
    async fn test_update_200_is_error() {
        let (ctx, transport, channel) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(200).with_body(json!({"unexpected": true})));

        let node = EntityNode::create(json!({"actionType": "update", "id": "E1"})).unwrap();
        let mut msg = Message::new(json!({"temperature": {"value": 21}}));
        node.run(&ctx, &mut msg).await.unwrap();

        assert_eq!(msg.status_code, Some(200));
        assert_eq!(msg.payload, json!({"unexpected": true}));
        let logs = channel.drain_logs();
        assert_eq!(logs[0].content, "Error while update entity: 200 OK");
    }

    #[tokio::test]
    async fn test_delete_requires_id() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        let node = EntityNode::create(json!({"actionType": "delete"})).unwrap();
        let mut msg = Message::new(Value::Null);

        let err = node.run(&ctx, &mut msg).await.unwrap_err();
        assert_eq!(err.to_string(), "id not found");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_ge_type() {
        let (ctx, _, _) = testing::context(GeType::Comet);
        let node = EntityNode::create(json!({"actionType": "read", "id": "E1"})).unwrap();
        let err = node.run(&ctx, &mut Message::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "FIWARE GE type not Orion");
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let (ctx, transport, channel) = testing::context(GeType::Orion);
        transport.push_failure("connection refused");

        let node = EntityNode::create(json!({"actionType": "read", "id": "E1"})).unwrap();
        let mut msg = Message::default();
        node.run(&ctx, &mut msg).await.unwrap();

        assert_eq!(msg.status_code, Some(500));
        assert_eq!(msg.payload, json!({"error": "connection refused"}));
        assert!(channel.drain_logs()[0].content.starts_with("Exception while read entity"));
    }

    #[test]
    fn test_schema_rejects_unknown_action() {
        assert!(EntityNode::create(json!({"actionType": "explode"})).is_err());
    }
}
