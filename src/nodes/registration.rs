use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    NgsiError, Result,
    config::GeType,
    model::Message,
    ngsi::{ActionType, Decoding, HttpMethod, RequestBuilder},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, created_id, finish, list, merge_config},
    runtime::NodeContext,
};

const FIELDS: [&str; 3] = ["actionType", "registrationId", "registration"];
const DEFAULT_LIMIT: u64 = 100;

/// Manage context provider registrations.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegistrationNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for RegistrationNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["config", "payload"] },
                "actionType": { "type": "string", "enum": ["create", "read", "delete"] },
                "registrationId": { "type": "string" },
                "registration": { "type": "object" }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Registration
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
        let registration_id = config.string("registrationId").or_else(|| match (self.mode, &msg.payload) {
            (InputMode::Config, Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            _ => None,
        });

        let registrations = |method| RequestBuilder::new(method, &broker.service_url, "/v2/registrations");
        let builder = match action {
            ActionType::Create => {
                let body = match self.mode {
                    InputMode::Config if msg.payload.is_object() => Some(msg.payload.clone()),
                    _ => config.get("registration").cloned(),
                };
                let body = body.filter(Value::is_object).ok_or_else(|| NgsiError::missing("registration"))?;
                registrations(HttpMethod::POST).json(body)
            }
            ActionType::Read => match &registration_id {
                Some(id) => registrations(HttpMethod::GET).segment(id),
                None => {
                    let request = |page: u64| registrations(HttpMethod::GET).options(&["count"]).page(page, DEFAULT_LIMIT);
                    return list(ctx, broker, msg, &scope, &request, Decoding::default(), false, "reading registrations").await;
                }
            },
            ActionType::Delete => registrations(HttpMethod::DELETE).segment(&registration_id.ok_or_else(|| NgsiError::missing("registrationId"))?),
            other => return Err(NgsiError::Config(format!("actionType '{}' not supported by registration node", other.as_ref()))),
        };

        let reply = ctx.call(broker, builder, &scope, action, Decoding::default()).await?;
        let id = created_id(&reply);
        let ok = finish(ctx, msg, &scope, reply, &format!("{} registration", action.as_ref()), None);
        if ok && action == ActionType::Create {
            msg.payload = id.map(Value::String).unwrap_or(Value::Null);
        }
        Ok(Emit::Message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{nodes::testing, transport::HttpResponse};

    fn registration() -> Value {
        json!({
            "dataProvided": {"entities": [{"id": "Room1", "type": "Room"}], "attrs": ["temperature"]},
            "provider": {"http": {"url": "http://provider:1234"}}
        })
    }

    #[tokio::test]
    async fn test_create_from_payload() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(201).with_header("Location", "/v2/registrations/abcde98765"));

        let node = RegistrationNode::create(json!({"actionType": "create"})).unwrap();
        let mut msg = Message::new(registration());
        node.run(&ctx, &mut msg).await.unwrap();

        assert_eq!(transport.requests()[0].pathname, "/v2/registrations");
        assert_eq!(msg.payload, json!("abcde98765"));
    }

    #[tokio::test]
    async fn test_read_by_id() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(200).with_body(registration()));

        let node = RegistrationNode::create(Value::Null).unwrap();
        let mut msg = Message::new("abcde98765");
        node.run(&ctx, &mut msg).await.unwrap();

        assert_eq!(transport.requests()[0].pathname, "/v2/registrations/abcde98765");
        assert_eq!(msg.payload["provider"]["http"]["url"], json!("http://provider:1234"));
    }

    #[tokio::test]
    async fn test_delete_missing_id() {
        let (ctx, transport, _) = testing::context(GeType::Orion);
        let node = RegistrationNode::create(json!({"mode": "payload", "actionType": "delete"})).unwrap();
        let err = node.run(&ctx, &mut Message::new(json!({}))).await.unwrap_err();
        assert_eq!(err.to_string(), "registrationId not found");
        assert!(transport.requests().is_empty());
    }
}
