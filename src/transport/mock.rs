use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use crate::{
    NgsiError, Result,
    ngsi::RequestDescriptor,
    transport::{HttpResponse, HttpTransport},
};

/// In-memory transport: replays queued responses in FIFO order and records
/// every request it was given.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        response: HttpResponse,
    ) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn push_failure(
        &self,
        message: &str,
    ) -> &Self {
        self.responses.lock().unwrap().push_back(Err(NgsiError::Transport(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
    ) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| Err(NgsiError::Transport("no response queued".to_string())))
    }
}
