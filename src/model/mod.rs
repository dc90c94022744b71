mod message;
mod node;

pub use message::{FiwareContext, Message};
pub use node::NodeModel;
