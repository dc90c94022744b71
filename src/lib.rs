//! # ngsiflow
//!
//! ngsiflow provides flow nodes that talk to FIWARE NGSI v2 services: the
//! Orion context broker, STH-Comet and QuantumLeap. It is meant to be
//! embedded in a flow runtime which feeds messages into deployed nodes and
//! collects what they emit.
//!
//! ## Core Features
//!
//! - **Value Codec**: reversible escaping of characters Orion forbids in attribute values
//! - **Request Builder**: service headers, bearer tokens, query options and paths
//! - **Response Classifier**: one table mapping `(action, status)` to a success or an error message
//! - **Pagination**: offset-based listing, buffered into one message or streamed page by page
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ngsiflow::{Config, EngineBuilder, Message, NodeModel};
//!
//! let config = Config::load_from_str(r#"
//!     [[brokers]]
//!     name = "orion"
//!     service_url = "http://localhost:1026"
//! "#)?;
//! let engine = EngineBuilder::new().config(config).build()?;
//!
//! let model = NodeModel::from_json(r#"{"id": "src", "uses": "source", "broker": "orion", "action": {"type": "Room"}}"#)?;
//! engine.deploy(&model)?;
//! engine.input("src", Message::default()).await?;
//!
//! let rooms = engine.channel().drain_outputs();
//! ```

mod auth;
mod builder;
mod common;
mod config;
mod engine;
mod error;
mod model;
pub mod ngsi;
pub mod nodes;
mod runtime;
mod transport;
mod utils;

use std::sync::{Arc, RwLock};

pub use auth::{StaticTokenProvider, TokenProvider};
pub use builder::EngineBuilder;
pub use config::{BrokerConfig, Config, GeType, HttpConfig, IdmType, SecurityConfig};
pub use engine::Engine;
pub use error::NgsiError;
pub use model::*;
pub use runtime::{Broker, Channel, LogLevel, Node, NodeContext, NodeId, NodeLog, NodeOutput, Reply};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

/// Result type alias for ngsiflow operations.
pub type Result<T> = std::result::Result<T, NgsiError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
