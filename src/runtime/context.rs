use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    NgsiError, Result,
    config::GeType,
    model::Message,
    ngsi::{ActionType, Decoding, RequestBuilder, ResponseOutcome, Scope, context, response},
    runtime::{Broker, Channel, LogLevel, NodeId, NodeLog, NodeOutput},
    transport::HttpTransport,
    utils,
};

/// Everything a node invocation may touch besides its own configuration.
#[derive(Clone)]
pub struct NodeContext {
    nid: NodeId,
    service: String,
    service_path: String,
    broker: Option<Arc<Broker>>,
    transport: Arc<dyn HttpTransport>,
    channel: Arc<Channel>,
}

/// Classified result of one call plus the raw response headers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub outcome: ResponseOutcome,
    pub headers: HashMap<String, String>,
}

impl Reply {
    pub fn header(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

impl NodeContext {
    pub fn new(
        nid: NodeId,
        service: &str,
        service_path: &str,
        broker: Option<Arc<Broker>>,
        transport: Arc<dyn HttpTransport>,
        channel: Arc<Channel>,
    ) -> Self {
        Self {
            nid,
            service: service.to_string(),
            service_path: service_path.to_string(),
            broker,
            transport,
            channel,
        }
    }

    pub fn nid(&self) -> &str {
        &self.nid
    }

    /// Scope of this invocation; node defaults are written into the message if it has none.
    pub fn resolve_scope(
        &self,
        msg: &mut Message,
    ) -> Scope {
        context::resolve(msg, &self.service, &self.service_path)
    }

    /// The bound broker, which must be of the given GE type.
    pub fn broker(
        &self,
        ge_type: GeType,
    ) -> Result<&Broker> {
        self.any_broker()?.expect(ge_type)
    }

    pub fn any_broker(&self) -> Result<&Broker> {
        self.broker.as_deref().ok_or_else(|| NgsiError::Config("FIWARE service is not configured".to_string()))
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    /// Emit a message on the node's output.
    pub fn send(
        &self,
        msg: Message,
    ) -> Result<()> {
        self.channel.output_queue().send(NodeOutput {
            nid: self.nid.clone(),
            msg,
        })
    }

    pub fn emit_log(
        &self,
        level: LogLevel,
        content: String,
    ) {
        match level {
            LogLevel::Info => info!(nid = %self.nid, "{}", content),
            LogLevel::Warn => warn!(nid = %self.nid, "{}", content),
            LogLevel::Error => error!(nid = %self.nid, "{}", content),
        }
        let log = NodeLog {
            nid: self.nid.clone(),
            level,
            content,
            timestamp: utils::time::time_millis(),
        };
        if let Err(err) = self.channel.log_queue().send(log) {
            warn!(nid = %self.nid, "node log dropped: {}", err);
        }
    }

    pub fn error(
        &self,
        content: impl Into<String>,
    ) {
        self.emit_log(LogLevel::Error, content.into());
    }

    /// Build, dispatch and classify one request.
    pub async fn call(
        &self,
        broker: &Broker,
        builder: RequestBuilder,
        scope: &Scope,
        action: ActionType,
        decoding: Decoding,
    ) -> Result<Reply> {
        let request = builder.build(scope, broker.token()).await?;
        let result = self.transport.send(&request).await;
        let headers = result.as_ref().map(|r| r.headers.clone()).unwrap_or_default();

        Ok(Reply {
            outcome: response::classify_result(action, result, decoding),
            headers,
        })
    }

    /// Write an outcome into the message and report failures.
    ///
    /// # Returns
    ///
    /// `true` when the outcome is a success.
    pub fn apply_outcome(
        &self,
        msg: &mut Message,
        outcome: ResponseOutcome,
        what: &str,
    ) -> bool {
        match outcome {
            ResponseOutcome::Success {
                status_code,
                body,
            } => {
                msg.payload = body.unwrap_or(Value::Null);
                msg.status_code = Some(status_code);
                true
            }
            ResponseOutcome::Error {
                status_code,
                message,
                detail,
                body,
            } => {
                self.error(format!("Error while {}: {}", what, message));
                for d in detail {
                    self.error(format!("Details: {}", d));
                }
                msg.payload = body.unwrap_or(Value::Null);
                msg.status_code = Some(status_code);
                false
            }
            ResponseOutcome::TransportFailure {
                message,
            } => {
                self.error(format!("Exception while {}: {}", what, message));
                msg.set_error(&message);
                false
            }
        }
    }
}
