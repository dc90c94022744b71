use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    NgsiError, Result,
    ngsi::{RequestBody, RequestDescriptor},
    transport::{HttpResponse, HttpTransport},
};

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    // request timeout in milliseconds
    timeout: u64,
}

impl ReqwestTransport {
    pub fn new(timeout: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    fn build_request(
        &self,
        request: &RequestDescriptor,
    ) -> Result<reqwest::RequestBuilder> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("accept"), HeaderValue::from_static("application/json, text/plain, */*"));

        for (key, value) in &request.headers {
            headers.insert(
                key.parse::<HeaderName>().map_err(|err| NgsiError::Convert(err.to_string()))?,
                value.parse().map_err(|err: InvalidHeaderValue| NgsiError::Convert(err.to_string()))?,
            );
        }

        let method: reqwest::Method = request.method.as_ref().parse().map_err(|_| NgsiError::Convert(format!("invalid method '{:?}'", request.method)))?;

        let mut builder = self.client.request(method, request.url()).headers(headers).query(&request.query);

        match &request.body {
            Some(RequestBody::Json(json)) => {
                builder = builder.body(serde_json::to_vec(json)?);
            }
            Some(RequestBody::Text(text)) => {
                builder = builder.body(text.clone());
            }
            Some(RequestBody::Form(form)) => {
                builder = builder.form(form);
            }
            None => {}
        }

        Ok(builder.timeout(Duration::from_millis(self.timeout)))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
    ) -> Result<HttpResponse> {
        let builder = self.build_request(request)?;
        debug!(method = request.method.as_ref(), url = %request.url(), "sending request");

        let res = builder.send().await.map_err(|err| {
            warn!(url = %request.url(), error = %err, "no response");
            NgsiError::Transport(format!("Http error: {}", err))
        })?;

        let status = res.status();
        let headers: HashMap<String, String> = res.headers().iter().map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or("").to_string())).collect();
        let text = res.text().await.map_err(|err| NgsiError::Transport(err.to_string()))?;

        let body = if text.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text)))
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
