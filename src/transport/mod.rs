//! HTTP dispatch seam.
//!
//! Nodes never talk to `reqwest` directly; they hand a
//! [`RequestDescriptor`] to an [`HttpTransport`]. Tests plug in
//! [`MockTransport`](mock::MockTransport).

mod http;
#[cfg(test)]
pub(crate) mod mock;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Result, ngsi::RequestDescriptor};

pub use http::ReqwestTransport;

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one request.
    ///
    /// # Returns
    ///
    /// Any HTTP response, whatever its status, is `Ok`. An `Err` means no
    /// response was received at all.
    async fn send(
        &self,
        request: &RequestDescriptor,
    ) -> Result<HttpResponse>;
}

/// Raw HTTP result handed to the response classifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// header names are lower-cased
    pub headers: HashMap<String, String>,
    /// parsed JSON, or the raw text as a JSON string; `None` when empty
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status).ok().and_then(|s| s.canonical_reason()).unwrap_or_default().to_string();
        Self {
            status,
            status_text,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_body(
        mut self,
        body: Value,
    ) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(
        mut self,
        name: &str,
        value: &str,
    ) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}
