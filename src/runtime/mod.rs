mod broker;
mod channel;
mod context;
mod node;

pub use broker::Broker;
pub use channel::{Channel, LogLevel, NodeLog, NodeOutput};
pub use context::{NodeContext, Reply};
pub use node::Node;

/// node id
pub type NodeId = String;
