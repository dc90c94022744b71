pub mod attribute;
pub mod batch_update;
pub mod dashboard;
pub mod encode_decode;
pub mod entity;
pub mod historical;
pub mod registration;
pub mod source;
pub mod subscription;
pub mod timeseries;
pub mod types;
pub mod version;
pub mod worldmap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    NgsiError, Result,
    model::Message,
    ngsi::{ActionConfig, BufferingSink, Decoding, PageEnd, RequestBuilder, Scope, StreamingSink, context, paginate},
    runtime::{Broker, NodeContext, Reply},
};

pub use attribute::AttributeNode;
pub use batch_update::BatchUpdateNode;
pub use dashboard::DashboardNode;
pub use encode_decode::EncodeDecodeNode;
pub use entity::EntityNode;
pub use historical::HistoricalNode;
pub use registration::RegistrationNode;
pub use source::SourceNode;
pub use subscription::SubscriptionNode;
pub use timeseries::TimeseriesNode;
pub use types::TypesNode;
pub use version::VersionNode;
pub use worldmap::WorldmapNode;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NodeType {
    Entity,
    Attribute,
    Source,
    Types,
    BatchUpdate,
    Subscription,
    Registration,
    Historical,
    Timeseries,
    Version,
    EncodeDecode,
    ToWorldmap,
    ToDashboard,
}

/// Where per-message options come from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// static node settings only; the payload is the request body
    #[default]
    Config,
    /// allowlisted payload fields override the static settings
    Payload,
}

/// What the host should do with the message after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// send the (mutated) input message downstream
    Message,
    /// the node already sent its outputs, or has nothing to send
    Nothing,
}

#[async_trait]
#[typetag::serde(tag = "node")]
pub trait NgsiNode: Send + Sync {
    /// Creates a new instance of the node from its static settings.
    ///
    /// # Arguments
    ///
    /// * `params` - The [`serde_json::Value`] containing the settings of the node.
    ///
    /// # Returns
    ///
    /// Returns a [`Result`] containing the created node instance.
    fn create(params: Value) -> Result<Self>
    where
        Self: Sized;

    /// Returns the JSON schema of the node settings.
    fn schema() -> Value
    where
        Self: Sized;

    /// Returns the [`NodeType`] of the node.
    fn node_type(&self) -> NodeType;

    /// Handles one input message, mutating it in place.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The [`NodeContext`] of the node instance.
    /// * `msg` - The input message, which becomes the output message.
    ///
    /// # Returns
    ///
    /// Returns [`Emit`] telling whether `msg` should be sent downstream. An
    /// `Err` is reported by the host and turned into an error message.
    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit>;
}

pub fn create_node(
    uses: NodeType,
    params: Value,
) -> Result<Box<dyn NgsiNode>> {
    match uses {
        NodeType::Entity => Ok(Box::new(EntityNode::create(params)?)),
        NodeType::Attribute => Ok(Box::new(AttributeNode::create(params)?)),
        NodeType::Source => Ok(Box::new(SourceNode::create(params)?)),
        NodeType::Types => Ok(Box::new(TypesNode::create(params)?)),
        NodeType::BatchUpdate => Ok(Box::new(BatchUpdateNode::create(params)?)),
        NodeType::Subscription => Ok(Box::new(SubscriptionNode::create(params)?)),
        NodeType::Registration => Ok(Box::new(RegistrationNode::create(params)?)),
        NodeType::Historical => Ok(Box::new(HistoricalNode::create(params)?)),
        NodeType::Timeseries => Ok(Box::new(TimeseriesNode::create(params)?)),
        NodeType::Version => Ok(Box::new(VersionNode::create(params)?)),
        NodeType::EncodeDecode => Ok(Box::new(EncodeDecodeNode::create(params)?)),
        NodeType::ToWorldmap => Ok(Box::new(WorldmapNode::create(params)?)),
        NodeType::ToDashboard => Ok(Box::new(DashboardNode::create(params)?)),
    }
}

/// Shared `create`: strict booleans first, then the schema, then serde.
pub(crate) fn create_from<T: DeserializeOwned>(
    params: Value,
    schema: &Value,
) -> Result<T> {
    let params = match params {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    if let Value::Object(obj) = &params {
        ActionConfig::check_booleans(obj)?;
    }
    jsonschema::validate(schema, &params)?;
    Ok(serde_json::from_value::<T>(params)?)
}

/// Merge defaults, static settings and, in payload mode, the payload.
pub(crate) fn merge_config(
    defaults: &Value,
    settings: &Map<String, Value>,
    mode: InputMode,
    payload: &Value,
    allowed: &[&str],
) -> Result<ActionConfig> {
    let settings = Value::Object(settings.clone());
    match mode {
        InputMode::Config => ActionConfig::merge(allowed, &[defaults, &settings]),
        InputMode::Payload => {
            if !payload.is_object() {
                return Err(NgsiError::Config("payload must be an object".to_string()));
            }
            ActionConfig::merge(allowed, &[defaults, &settings, payload])
        }
    }
}

/// Entity id carried by a payload: a bare string or an object's `id`.
pub(crate) fn payload_id(payload: &Value) -> Option<String> {
    let id = match payload {
        Value::String(s) => s.trim(),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::trim).unwrap_or_default(),
        _ => "",
    };
    if id.is_empty() { None } else { Some(id.to_string()) }
}

/// An entity stripped of `id` and `type`, leaving only attributes.
pub(crate) fn attributes_of(entity: &Value) -> Value {
    match entity {
        Value::Object(obj) => Value::Object(obj.iter().filter(|(k, _)| *k != "id" && *k != "type").map(|(k, v)| (k.clone(), v.clone())).collect()),
        other => other.clone(),
    }
}

/// The set option flags restricted to those meaningful for one operation.
pub(crate) fn options_for(
    config: &ActionConfig,
    allowed: &[&'static str],
) -> Vec<&'static str> {
    config.options().into_iter().filter(|o| allowed.contains(o)).collect()
}

/// Apply a reply to the message and stamp its scope.
pub(crate) fn finish(
    ctx: &NodeContext,
    msg: &mut Message,
    scope: &Scope,
    reply: Reply,
    what: &str,
    total_count: Option<u64>,
) -> bool {
    let ok = ctx.apply_outcome(msg, reply.outcome, what);
    context::stamp(msg, scope, total_count);
    ok
}

/// Id of a created resource, taken from the last segment of `Location`.
pub(crate) fn created_id(reply: &Reply) -> Option<String> {
    let location = reply.header("location")?;
    let path = location.split('?').next().unwrap_or_default();
    path.rsplit('/').next().map(str::trim).filter(|id| !id.is_empty()).map(str::to_string)
}

/// Run a paged listing and deliver it through the configured sink.
///
/// Buffered output replaces the payload with every item at once. Streamed
/// output sends one message per page as pages arrive and emits nothing
/// more, except when the listing was empty or failed.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn list(
    ctx: &NodeContext,
    broker: &Broker,
    msg: &mut Message,
    scope: &Scope,
    request: &(dyn Fn(u64) -> RequestBuilder + Send + Sync),
    decoding: Decoding,
    streaming: bool,
    what: &str,
) -> Result<Emit> {
    let (end, items) = if streaming {
        let template = msg.clone();
        let mut sink = StreamingSink::new(ctx, &template, scope.clone());
        let end = paginate(ctx.transport(), broker.token(), scope, request, decoding, &mut sink).await?;
        if sink.pages() > 0 && matches!(end, PageEnd::Completed { .. }) {
            return Ok(Emit::Nothing);
        }
        (end, Vec::new())
    } else {
        let mut sink = BufferingSink::new();
        let end = paginate(ctx.transport(), broker.token(), scope, request, decoding, &mut sink).await?;
        (end, sink.into_items())
    };

    match end {
        PageEnd::Completed {
            total,
            ..
        } => {
            msg.payload = Value::Array(items);
            msg.status_code = Some(200);
            context::stamp(msg, scope, total);
        }
        PageEnd::Failed(outcome) => {
            ctx.apply_outcome(msg, outcome, what);
            context::stamp(msg, scope, None);
        }
    }
    Ok(Emit::Message)
}

/// Entities carried by a message: an array, a single entity, or the `data`
/// array of a subscription notification.
pub(crate) fn entities_of(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(arr) => arr.clone(),
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(data)) if obj.contains_key("subscriptionId") => data.clone(),
            _ => vec![payload.clone()],
        },
        _ => Vec::new(),
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_node_type_names() {
        assert_eq!(NodeType::BatchUpdate.as_ref(), "batch-update");
        assert_eq!("to-worldmap".parse::<NodeType>().unwrap(), NodeType::ToWorldmap);
    }

    #[test]
    fn test_create_node_rejects_non_boolean_option() {
        let err = create_node(NodeType::Entity, json!({"actionType": "read", "skipForwarding": "false"})).err().unwrap();
        assert_eq!(err.to_string(), "skipForwarding not boolean");
    }

    #[test]
    fn test_node_serializes_as_trait_object() {
        let node = create_node(NodeType::Version, Value::Null).unwrap();
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["node"], json!("VersionNode"));
        let back: Box<dyn NgsiNode> = serde_json::from_value(value).unwrap();
        assert_eq!(back.node_type(), NodeType::Version);
    }

    #[test]
    fn test_payload_helpers() {
        assert_eq!(payload_id(&json!(" E1 ")).as_deref(), Some("E1"));
        assert_eq!(payload_id(&json!({"id": "E2", "type": "T"})).as_deref(), Some("E2"));
        assert_eq!(payload_id(&json!(3)), None);
        assert_eq!(attributes_of(&json!({"id": "E", "type": "T", "a": {"value": 1}})), json!({"a": {"value": 1}}));

        let notification = json!({"subscriptionId": "s1", "data": [{"id": "E1"}, {"id": "E2"}]});
        assert_eq!(entities_of(&notification).len(), 2);
        assert_eq!(entities_of(&json!({"id": "E1"})).len(), 1);
        assert!(entities_of(&json!("x")).is_empty());
    }

    #[test]
    fn test_merge_config_modes() {
        let settings = json!({"id": "E1"}).as_object().unwrap().clone();
        let payload = json!({"id": "E2"});

        let config = merge_config(&json!({}), &settings, InputMode::Config, &payload, &["id"]).unwrap();
        assert_eq!(config.string("id").as_deref(), Some("E1"));

        let config = merge_config(&json!({}), &settings, InputMode::Payload, &payload, &["id"]).unwrap();
        assert_eq!(config.string("id").as_deref(), Some("E2"));

        assert!(merge_config(&json!({}), &settings, InputMode::Payload, &json!("E3"), &["id"]).is_err());
    }
}
