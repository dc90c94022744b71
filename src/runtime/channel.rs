use std::sync::Arc;

use crate::{common::Queue, model::Message, runtime::NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Log entry emitted by a node, surfaced to the host.
#[derive(Debug, Clone)]
pub struct NodeLog {
    /// Node ID that generated this log.
    pub nid: NodeId,
    pub level: LogLevel,
    /// Log message content.
    pub content: String,
    /// Timestamp in milliseconds of the log entry.
    pub timestamp: i64,
}

/// Message leaving a node's output port.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub nid: NodeId,
    pub msg: Message,
}

/// Output and log queues shared by every node of an engine.
#[derive(Clone)]
pub struct Channel {
    output_queue: Arc<Queue<NodeOutput>>,
    log_queue: Arc<Queue<NodeLog>>,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel {
    pub fn new() -> Self {
        Self {
            output_queue: Queue::new(),
            log_queue: Queue::new(),
        }
    }

    pub fn output_queue(&self) -> Arc<Queue<NodeOutput>> {
        self.output_queue.clone()
    }

    pub fn log_queue(&self) -> Arc<Queue<NodeLog>> {
        self.log_queue.clone()
    }

    /// Messages emitted so far, in emission order.
    pub fn drain_outputs(&self) -> Vec<NodeOutput> {
        self.output_queue.drain()
    }

    pub fn drain_logs(&self) -> Vec<NodeLog> {
        self.log_queue.drain()
    }
}
