use serde_json::Value;
use tracing::debug;

use crate::{
    NgsiError, Result,
    model::{Message, NodeModel},
    nodes::{self, Emit, NgsiNode, NodeType},
    runtime::{NodeContext, NodeId},
};

/// A deployed node: its immutable settings plus the context it runs in.
pub struct Node {
    /// node id
    pub id: NodeId,
    /// node name
    pub name: String,
    /// node type
    pub uses: NodeType,
    /// settings the node was created from
    pub action_data: Value,
    ctx: NodeContext,
    action: Box<dyn NgsiNode>,
}

impl Node {
    pub fn new(
        model: &NodeModel,
        ctx: NodeContext,
    ) -> Result<Self> {
        let uses = model.uses.trim().parse::<NodeType>().map_err(|_| NgsiError::Node(format!("invalid 'uses': {}", model.uses)))?;
        let action = nodes::create_node(uses, model.action.clone())?;

        Ok(Self {
            id: model.id.clone(),
            name: model.name.clone(),
            uses,
            action_data: model.action.clone(),
            ctx,
            action,
        })
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    /// Handle one input message.
    ///
    /// Configuration errors never escape: they are logged on the node and
    /// forwarded as `{error}` with status 500, like transport failures.
    pub async fn input(
        &self,
        mut msg: Message,
    ) -> Result<()> {
        debug!(nid = %self.id, uses = self.uses.as_ref(), msgid = %msg.msgid, "input");
        match self.action.run(&self.ctx, &mut msg).await {
            Ok(Emit::Message) => self.ctx.send(msg),
            Ok(Emit::Nothing) => Ok(()),
            Err(err) => {
                let message = err.to_string();
                self.ctx.error(message.clone());
                msg.set_error(&message);
                self.ctx.send(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{config::GeType, nodes::testing, runtime::LogLevel, transport::HttpResponse};

    fn model(
        uses: &str,
        action: Value,
    ) -> NodeModel {
        NodeModel {
            id: "n1".to_string(),
            uses: uses.to_string(),
            action,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_config_error_becomes_error_message() {
        let (ctx, transport, channel) = testing::context(GeType::Orion);
        let node = Node::new(&model("entity", json!({"mode": "payload"})), ctx).unwrap();

        node.input(Message::new(json!({"actionType": "read", "id": "E1", "skipForwarding": "false"}))).await.unwrap();

        assert!(transport.requests().is_empty());
        let outputs = channel.drain_outputs();
        assert_eq!(outputs[0].msg.payload, json!({"error": "skipForwarding not boolean"}));
        assert_eq!(outputs[0].msg.status_code, Some(500));
        let logs = channel.drain_logs();
        assert_eq!(logs[0].level, LogLevel::Error);
        assert_eq!(logs[0].content, "skipForwarding not boolean");
    }

    #[tokio::test]
    async fn test_success_is_forwarded() {
        let (ctx, transport, channel) = testing::context(GeType::Orion);
        transport.push(HttpResponse::new(200).with_body(json!({"orion": {"version": "3.10.1"}})));
        let node = Node::new(&model("version", Value::Null), ctx).unwrap();

        node.input(Message::default()).await.unwrap();

        let outputs = channel.drain_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].nid, "n1");
        assert_eq!(outputs[0].msg.status_code, Some(200));
    }

    #[test]
    fn test_unknown_node_type() {
        let (ctx, _) = testing::offline();
        let err = Node::new(&model("gateway", Value::Null), ctx).err().unwrap();
        assert_eq!(err.to_string(), "invalid 'uses': gateway");
    }
}
