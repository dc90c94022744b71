//! Request descriptors and the shared request builder.

use serde_json::Value;
use tracing::debug;

use crate::{Result, auth::TokenProvider, ngsi::action::ActionConfig, ngsi::context::Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    Form(Vec<(String, String)>),
}

impl RequestBody {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::Text(_) => "text/plain",
            RequestBody::Form(_) => "application/x-www-form-urlencoded",
        }
    }
}

/// A fully resolved HTTP call, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub host: String,
    pub pathname: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub fn url(&self) -> String {
        format!("{}{}", self.host, self.pathname)
    }

    /// Case-insensitive header lookup.
    pub fn header(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn query_param(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Map a logical content-type tag to a MIME type.
pub fn content_type(tag: &str) -> String {
    match tag {
        "json" => "application/json".to_string(),
        other => other.to_string(),
    }
}

/// Assemble the FIWARE headers in their fixed order, skipping empty values.
///
/// The token provider is only consulted when present; without one no
/// `Authorization` header is sent.
pub async fn fiware_headers(
    service: &str,
    service_path: &str,
    token: Option<&dyn TokenProvider>,
    content_tag: Option<&str>,
) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    if !service.trim().is_empty() {
        headers.push(("Fiware-Service".to_string(), service.trim().to_string()));
    }
    if !service_path.trim().is_empty() {
        headers.push(("Fiware-ServicePath".to_string(), service_path.trim().to_string()));
    }
    if let Some(provider) = token {
        let token = provider.fetch().await?;
        if !token.is_empty() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
    }
    if let Some(tag) = content_tag.filter(|t| !t.is_empty()) {
        headers.push(("Content-Type".to_string(), content_type(tag)));
    }
    Ok(headers)
}

pub struct RequestBuilder {
    method: HttpMethod,
    host: String,
    pathname: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    content_tag: Option<String>,
}

impl RequestBuilder {
    pub fn new(
        method: HttpMethod,
        host: &str,
        base_path: &str,
    ) -> Self {
        Self {
            method,
            host: host.trim().trim_end_matches('/').to_string(),
            pathname: base_path.to_string(),
            query: Vec::new(),
            body: None,
            content_tag: None,
        }
    }

    /// Append a trimmed identifier as a literal path segment.
    pub fn segment(
        mut self,
        segment: &str,
    ) -> Self {
        self.pathname.push('/');
        self.pathname.push_str(segment.trim());
        self
    }

    pub fn value_suffix(
        self,
        value_only: bool,
    ) -> Self {
        if value_only { self.segment("value") } else { self }
    }

    /// Set a query parameter, replacing an earlier value for the same key.
    pub fn query(
        mut self,
        key: &str,
        value: impl Into<String>,
    ) -> Self {
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key.to_string(), value)),
        }
        self
    }

    /// Copy the listed keys from `config` when present and non-empty.
    pub fn query_from(
        mut self,
        config: &ActionConfig,
        keys: &[&str],
    ) -> Self {
        for key in keys {
            if let Some(value) = config.string(key) {
                self = self.query(key, value);
            }
        }
        self
    }

    /// Add `options=a,b,...` unless no flag is set.
    pub fn options(
        self,
        flags: &[&str],
    ) -> Self {
        if flags.is_empty() { self } else { self.query("options", flags.join(",")) }
    }

    /// Paging parameters of search endpoints: `offset = page * limit`.
    pub fn page(
        self,
        page: u64,
        limit: u64,
    ) -> Self {
        self.query("limit", limit.to_string()).query("offset", (page * limit).to_string())
    }

    pub fn body(
        mut self,
        body: RequestBody,
    ) -> Self {
        if self.content_tag.is_none() {
            self.content_tag = Some(body.content_type().to_string());
        }
        self.body = Some(body);
        self
    }

    pub fn json(
        self,
        value: Value,
    ) -> Self {
        self.content_type("json").body(RequestBody::Json(value))
    }

    pub fn content_type(
        mut self,
        tag: &str,
    ) -> Self {
        self.content_tag = Some(tag.to_string());
        self
    }

    pub async fn build(
        self,
        scope: &Scope,
        token: Option<&dyn TokenProvider>,
    ) -> Result<RequestDescriptor> {
        let headers = fiware_headers(&scope.service, &scope.service_path, token, self.content_tag.as_deref()).await?;
        debug!(method = self.method.as_ref(), path = %self.pathname, "request built");

        Ok(RequestDescriptor {
            method: self.method,
            host: self.host,
            pathname: self.pathname,
            headers,
            query: self.query,
            body: self.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    struct FixedToken;

    #[async_trait]
    impl TokenProvider for FixedToken {
        async fn fetch(&self) -> Result<String> {
            Ok("abc123".to_string())
        }
    }

    fn scope(
        service: &str,
        service_path: &str,
    ) -> Scope {
        Scope {
            service: service.to_string(),
            service_path: service_path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_headers_in_order() {
        let provider = FixedToken;
        let headers = fiware_headers("openiot", "/", Some(&provider), Some("json")).await.unwrap();
        let names: Vec<&str> = headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["Fiware-Service", "Fiware-ServicePath", "Authorization", "Content-Type"]);
        assert_eq!(headers[2].1, "Bearer abc123");
        assert_eq!(headers[3].1, "application/json");
    }

    #[tokio::test]
    async fn test_headers_skip_empty() {
        let headers = fiware_headers("", " ", None, Some("text/plain")).await.unwrap();
        assert_eq!(headers, vec![("Content-Type".to_string(), "text/plain".to_string())]);

        let headers = fiware_headers("", "", None, None).await.unwrap();
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn test_build_path_and_query() {
        let config = ActionConfig::merge(&["type", "attrs", "q", "limit"], &[&json!({"type": "Thing", "attrs": ["a", "b"], "q": ""})]).unwrap();
        let request = RequestBuilder::new(HttpMethod::GET, "http://orion:1026/", "/v2/entities")
            .segment(" urn:ngsi-ld:Thing:001 ")
            .segment("attrs")
            .segment("temperature")
            .value_suffix(true)
            .query_from(&config, &["type", "attrs", "q", "limit"])
            .options(&["keyValues", "skipForwarding"])
            .build(&scope("openiot", "/"), None)
            .await
            .unwrap();

        assert_eq!(request.url(), "http://orion:1026/v2/entities/urn:ngsi-ld:Thing:001/attrs/temperature/value");
        assert_eq!(request.query_param("type"), Some("Thing"));
        assert_eq!(request.query_param("attrs"), Some("a,b"));
        assert_eq!(request.query_param("q"), None);
        assert_eq!(request.query_param("options"), Some("keyValues,skipForwarding"));
        assert_eq!(request.header("fiware-service"), Some("openiot"));
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn test_query_never_duplicates() {
        let request = RequestBuilder::new(HttpMethod::GET, "http://orion:1026", "/v2/entities")
            .query("limit", "20")
            .page(3, 100)
            .options(&[])
            .build(&scope("", ""), None)
            .await
            .unwrap();
        assert_eq!(request.query, vec![("limit".to_string(), "100".to_string()), ("offset".to_string(), "300".to_string())]);
    }

    #[tokio::test]
    async fn test_body_sets_content_type() {
        let request = RequestBuilder::new(HttpMethod::PUT, "http://orion:1026", "/v2/entities")
            .body(RequestBody::Text("25".to_string()))
            .build(&scope("", ""), None)
            .await
            .unwrap();
        assert_eq!(request.header("Content-Type"), Some("text/plain"));

        let request = RequestBuilder::new(HttpMethod::POST, "http://orion:1026", "/v2/entities")
            .json(json!({"id": "E1"}))
            .build(&scope("", ""), None)
            .await
            .unwrap();
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body, Some(RequestBody::Json(json!({"id": "E1"}))));
    }
}
