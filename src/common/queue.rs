//! Message queue for node outputs and logs.

use std::sync::Arc;

use crate::{NgsiError, Result};

/// Unbounded MPMC (multi-producer, multi-consumer) queue.
///
/// Backed by flume; every message is consumed by exactly one receiver.
/// Nodes write from async code while the host drains only after
/// `Engine::input` returns, so a send must never wait for room.
#[derive(Clone)]
pub struct Queue<T> {
    receiver: Arc<flume::Receiver<T>>,
    sender: Arc<flume::Sender<T>>,
}

impl<T> Queue<T> {
    /// create a new queue
    pub fn new() -> Arc<Self> {
        let (tx, rx) = flume::unbounded();

        Arc::new(Self {
            receiver: Arc::new(rx),
            sender: Arc::new(tx),
        })
    }

    /// drain every message that is ready
    pub fn drain(&self) -> Vec<T> {
        self.receiver.drain().collect()
    }

    /// send a message to the queue without blocking
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| NgsiError::Queue(e.to_string()))
    }
}
