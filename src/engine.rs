//! Node host - the main entry point for ngsiflow.
//!
//! The engine plays the part of a flow runtime:
//! - Building brokers and token providers from [`Config`]
//! - Deploying node definitions
//! - Delivering input messages to nodes
//! - Exposing the output and log queues through a [`Channel`]

use std::{collections::HashMap, sync::Arc};

use tracing::info;

use crate::{
    Config, NgsiError, Result, ShareLock,
    auth::CachedToken,
    common::MemCache,
    model::{Message, NodeModel},
    runtime::{Broker, Channel, Node, NodeContext, NodeId},
    transport::HttpTransport,
};

/// Maximum number of cached access tokens, one per secured broker.
const TOKEN_CACHE_SIZE: usize = 256;

/// The node host.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::create("ngsiflow.toml")?;
/// let engine = EngineBuilder::new().config(config).build()?;
///
/// let model = NodeModel::from_json(r#"{"id": "n1", "uses": "entity", "broker": "orion", "action": {"actionType": "read"}}"#)?;
/// let nid = engine.deploy(&model)?;
/// engine.input(&nid, Message::new("Room1")).await?;
///
/// for output in engine.channel().drain_outputs() {
///     println!("{}: {:?}", output.nid, output.msg.payload);
/// }
/// ```
pub struct Engine {
    /// Output and log queues shared by every node.
    channel: Arc<Channel>,
    /// Dispatch seam used by nodes and token providers.
    transport: Arc<dyn HttpTransport>,
    /// Configured brokers by name.
    brokers: HashMap<String, Arc<Broker>>,
    /// Deployed nodes by id.
    nodes: ShareLock<HashMap<NodeId, Arc<Node>>>,
}

impl Engine {
    pub(crate) fn new(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let tokens: Arc<MemCache<String, CachedToken>> = Arc::new(MemCache::new(TOKEN_CACHE_SIZE));

        let mut brokers = HashMap::new();
        for broker in &config.brokers {
            if brokers.contains_key(&broker.name) {
                return Err(NgsiError::Config(format!("broker '{}' is duplicated", broker.name)));
            }
            let built = Broker::from_config(broker, transport.clone(), tokens.clone())?;
            info!(broker = %built.name, ge_type = built.ge_type.as_ref(), url = %built.service_url, "broker configured");
            brokers.insert(broker.name.clone(), Arc::new(built));
        }

        Ok(Self {
            channel: Arc::new(Channel::new()),
            transport,
            brokers,
            nodes: ShareLock::default(),
        })
    }

    /// Deploys a node and returns its id.
    ///
    /// The node settings are validated here, once; a later message can no
    /// longer change them.
    pub fn deploy(
        &self,
        model: &NodeModel,
    ) -> Result<NodeId> {
        if model.id.trim().is_empty() {
            return Err(NgsiError::Node("node id is empty".to_string()));
        }
        let broker = match &model.broker {
            Some(name) => Some(self.brokers.get(name).cloned().ok_or_else(|| NgsiError::Config(format!("broker '{}' not found", name)))?),
            None => None,
        };

        let ctx = NodeContext::new(model.id.clone(), &model.service, &model.service_path, broker, self.transport.clone(), self.channel.clone());
        let node = Node::new(model, ctx)?;

        let mut nodes = self.nodes.write().map_err(|e| NgsiError::Runtime(e.to_string()))?;
        if nodes.contains_key(&model.id) {
            return Err(NgsiError::Node(format!("node({}) is already deployed", model.id)));
        }
        info!(nid = %model.id, uses = node.uses.as_ref(), "node deployed");
        nodes.insert(model.id.clone(), Arc::new(node));
        Ok(model.id.clone())
    }

    /// Removes a deployed node.
    pub fn undeploy(
        &self,
        nid: &str,
    ) -> Result<()> {
        let mut nodes = self.nodes.write().map_err(|e| NgsiError::Runtime(e.to_string()))?;
        nodes.remove(nid).map(|_| ()).ok_or_else(|| NgsiError::Node(format!("node({}) not found", nid)))
    }

    /// Gets a deployed node by its id.
    pub fn node(
        &self,
        nid: &str,
    ) -> Option<Arc<Node>> {
        self.nodes.read().ok().and_then(|nodes| nodes.get(nid).cloned())
    }

    /// Delivers one message to a node; its outputs land on [`channel`](Self::channel).
    pub async fn input(
        &self,
        nid: &str,
        msg: Message,
    ) -> Result<()> {
        let node = self.node(nid).ok_or_else(|| NgsiError::Node(format!("node({}) not found", nid)))?;
        node.input(msg).await
    }

    /// Returns a reference to the output and log channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }
}
