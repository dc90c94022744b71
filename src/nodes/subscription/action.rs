use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::models::Subscription;
use crate::{
    NgsiError, Result,
    config::GeType,
    model::Message,
    ngsi::{ActionType, Decoding, HttpMethod, RequestBuilder},
    nodes::{Emit, InputMode, NgsiNode, NodeType, create_from, created_id, finish, list, merge_config},
    runtime::NodeContext,
};

const FIELDS: [&str; 21] = [
    "actionType",
    "subscriptionId",
    "subscription",
    "description",
    "id",
    "idPattern",
    "type",
    "watchedAttrs",
    "q",
    "mq",
    "georel",
    "geometry",
    "coords",
    "url",
    "attrs",
    "exceptAttrs",
    "attrsFormat",
    "metadata",
    "onlyChangedAttrs",
    "expires",
    "throttling",
];

const DEFAULT_LIMIT: u64 = 100;

/// Manage context subscriptions: create, read, update and delete.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubscriptionNode {
    #[serde(default)]
    mode: InputMode,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

#[async_trait]
#[typetag::serde]
impl NgsiNode for SubscriptionNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["config", "payload"] },
                "actionType": { "type": "string", "enum": ["create", "read", "update", "delete"] },
                "subscriptionId": { "type": "string" },
                "url": { "type": "string" },
                "throttling": { "type": ["integer", "string"] }
            }
        })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Subscription
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.broker(GeType::Orion)?;
        let scope = ctx.resolve_scope(msg);
        let config = merge_config(&json!({ "actionType": "create" }), &self.settings, self.mode, &msg.payload, &FIELDS)?;
        let action = config.action_type()?;
        let subscription_id = || -> Result<String> {
            match (config.string("subscriptionId"), self.mode, &msg.payload) {
                (Some(id), _, _) => Ok(id),
                (None, InputMode::Config, Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
                _ => Err(NgsiError::missing("subscriptionId")),
            }
        };

        let subscriptions = |method| RequestBuilder::new(method, &broker.service_url, "/v2/subscriptions");
        let builder = match action {
            ActionType::Create => {
                let body = serde_json::to_value(Subscription::from_config(&config)?)?;
                subscriptions(HttpMethod::POST).json(body)
            }
            ActionType::Read => match subscription_id() {
                Ok(id) => subscriptions(HttpMethod::GET).segment(&id),
                Err(_) => {
                    let request = |page: u64| subscriptions(HttpMethod::GET).options(&["count"]).page(page, DEFAULT_LIMIT);
                    return list(ctx, broker, msg, &scope, &request, Decoding::default(), false, "reading subscriptions").await;
                }
            },
            ActionType::Update => {
                let id = subscription_id()?;
                let body = match self.mode {
                    InputMode::Config => Some(msg.payload.clone()),
                    InputMode::Payload => config.get("subscription").cloned(),
                };
                let body = body.filter(Value::is_object).ok_or_else(|| NgsiError::missing("subscription"))?;
                subscriptions(HttpMethod::PATCH).segment(&id).json(body)
            }
            ActionType::Delete => subscriptions(HttpMethod::DELETE).segment(&subscription_id()?),
            other => return Err(NgsiError::Config(format!("actionType '{}' not supported by subscription node", other.as_ref()))),
        };

        let reply = ctx.call(broker, builder, &scope, action, Decoding::default()).await?;
        let id = created_id(&reply);
        let ok = finish(ctx, msg, &scope, reply, &format!("{} subscription", action.as_ref()), None);
        if ok && action == ActionType::Create {
            msg.payload = id.map(Value::String).unwrap_or(Value::Null);
        }
        Ok(Emit::Message)
    }
}
