use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    NgsiError, Result,
    config::GeType,
    model::Message,
    ngsi::{ActionType, Decoding, HttpMethod, RequestBuilder, codec},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, finish, merge_config, options_for, payload_id},
    runtime::NodeContext,
};

const FIELDS: [&str; 11] = ["actionType", "id", "type", "attrName", "attribute", "value", "metadata", "skipForwarding", "forcedUpdate", "overrideMetadata", "forbidden"];

/// Read, update or delete a single attribute of an entity.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AttributeNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for AttributeNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["config", "payload"] },
                "actionType": { "type": "string", "enum": ["read", "update", "delete", "value", "valueUpdate"] },
                "id": { "type": "string" },
                "type": { "type": "string" },
                "attrName": { "type": "string" }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Attribute
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Orion)?;
        let scope = ctx.resolve_scope(msg);
        let config = merge_config(&json!({ "actionType": "read" }), &self.settings, self.mode, &msg.payload, &FIELDS)?;
        let action = config.action_type()?;
        let forbidden = config.flag("forbidden");

        let id = match config.string("id") {
            Some(id) => id,
            None if self.mode == InputMode::Config => payload_id(&msg.payload).ok_or_else(|| NgsiError::missing("id"))?,
            None => return Err(NgsiError::missing("id")),
        };
        let attr_name = config.require("attrName")?;
        // in config mode the payload is the attribute (or its bare value)
        let body = match self.mode {
            InputMode::Config => Some(msg.payload.clone()),
            InputMode::Payload => config.get(if action == ActionType::ValueUpdate { "value" } else { "attribute" }).cloned(),
        };

        let attrs = |method| RequestBuilder::new(method, &broker.service_url, "/v2/entities").segment(&id).segment("attrs").segment(&attr_name).query_from(&config, &["type"]);
        let builder = match action {
            ActionType::Read => attrs(HttpMethod::GET).query_from(&config, &["metadata"]).options(&options_for(&config, &["skipForwarding"])),
            ActionType::Value => attrs(HttpMethod::GET).value_suffix(true).options(&options_for(&config, &["skipForwarding"])),
            ActionType::Update => {
                let attribute = body.filter(Value::is_object).ok_or_else(|| NgsiError::missing("attribute"))?;
                attrs(HttpMethod::PUT).options(&options_for(&config, &["forcedUpdate", "overrideMetadata"])).json(codec::encode_attribute(&attribute, forbidden))
            }
            ActionType::ValueUpdate => {
                let value = codec::encode_value(&body.unwrap_or(Value::Null), forbidden);
                attrs(HttpMethod::PUT).value_suffix(true).options(&options_for(&config, &["forcedUpdate"])).body(codec::stringify(&value))
            }
            ActionType::Delete => attrs(HttpMethod::DELETE),
            other => return Err(NgsiError::Config(format!("actionType '{}' not supported by attribute node", other.as_ref()))),
        };

        let decoding = Decoding {
            forbidden,
            attribute: action == ActionType::Read,
            ..Default::default()
        };
        let reply = ctx.call(broker, builder, &scope, action, decoding).await?;
        finish(ctx, msg, &scope, reply, &format!("{} attribute", action.as_ref()), None);
        Ok(Emit::Message)
    }
}
