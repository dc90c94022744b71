use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    model::Message,
    ngsi::{ActionType, Decoding, HttpMethod, RequestBuilder},
    nodes::{Emit, NgsiNode, NodeType, create_from, finish},
    runtime::NodeContext,
};

/// Version information of whichever service the node is bound to.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VersionNode {}

#[async_trait]
#[typetag::serde]
impl NgsiNode for VersionNode {
    fn create(params: Value) -> Result<Self> {
        create_from(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({ "type": "object" })
    }

    fn node_type(&self) -> NodeType {
        NodeType::Version
    }

    async fn run(
        &self,
        ctx: &NodeContext,
        msg: &mut Message,
    ) -> Result<Emit> {
        let broker = ctx.any_broker()?;
        let scope = ctx.resolve_scope(msg);
        let builder = RequestBuilder::new(HttpMethod::GET, &broker.service_url, "/version");
        let reply = ctx.call(broker, builder, &scope, ActionType::Read, Decoding::default()).await?;
        finish(ctx, msg, &scope, reply, "reading version", None);
        Ok(Emit::Message)
    }
}
