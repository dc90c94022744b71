use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    NgsiError, Result,
    auth::TokenProvider,
    common::MemCache,
    config::{IdmType, SecurityConfig},
    ngsi::{HttpMethod, RequestBody, RequestDescriptor},
    transport::{HttpResponse, HttpTransport},
    utils::time::time_millis,
};

/// A token is refreshed this long before it expires.
const EXPIRY_MARGIN_MS: i64 = 60_000;
/// Lifetime assumed when the identity manager does not report one.
const DEFAULT_TTL_MS: i64 = 300_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedToken {
    pub token: String,
    /// expiry timestamp in milliseconds
    pub expires_at: i64,
}

/// Resource-owner password grant against Keyrock, Keycloak or a token proxy.
pub struct PasswordTokenProvider {
    broker: String,
    security: SecurityConfig,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<MemCache<String, CachedToken>>,
}

impl PasswordTokenProvider {
    pub fn new(
        broker: &str,
        security: SecurityConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<MemCache<String, CachedToken>>,
    ) -> Self {
        Self {
            broker: broker.to_string(),
            security,
            transport,
            cache,
        }
    }

    fn token_request(&self) -> RequestDescriptor {
        let endpoint = self.security.idm_endpoint.trim().trim_end_matches('/').to_string();
        let s = &self.security;

        match s.idm_type {
            IdmType::Keyrock => {
                let credentials = STANDARD.encode(format!("{}:{}", s.client_id, s.client_secret));
                RequestDescriptor {
                    method: HttpMethod::POST,
                    host: endpoint,
                    pathname: "/oauth2/token".to_string(),
                    headers: vec![
                        ("Authorization".to_string(), format!("Basic {}", credentials)),
                        ("Content-Type".to_string(), "application/x-www-form-urlencoded".to_string()),
                    ],
                    query: Vec::new(),
                    body: Some(RequestBody::Form(vec![
                        ("grant_type".to_string(), "password".to_string()),
                        ("username".to_string(), s.username.clone()),
                        ("password".to_string(), s.password.clone()),
                    ])),
                }
            }
            IdmType::Keycloak => RequestDescriptor {
                method: HttpMethod::POST,
                host: endpoint,
                pathname: String::new(),
                headers: vec![("Content-Type".to_string(), "application/x-www-form-urlencoded".to_string())],
                query: Vec::new(),
                body: Some(RequestBody::Form(vec![
                    ("grant_type".to_string(), "password".to_string()),
                    ("client_id".to_string(), s.client_id.clone()),
                    ("client_secret".to_string(), s.client_secret.clone()),
                    ("username".to_string(), s.username.clone()),
                    ("password".to_string(), s.password.clone()),
                ])),
            },
            IdmType::Tokenproxy | IdmType::Static => RequestDescriptor {
                method: HttpMethod::POST,
                host: endpoint,
                pathname: "/token".to_string(),
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                query: Vec::new(),
                body: Some(RequestBody::Json(serde_json::json!({
                    "username": s.username,
                    "password": s.password,
                }))),
            },
        }
    }

    fn parse_token(
        &self,
        response: &HttpResponse,
        now: i64,
    ) -> Result<CachedToken> {
        if response.status != 200 && response.status != 201 {
            return Err(NgsiError::Auth(format!("token request failed: {} {}", response.status, response.status_text)));
        }

        let (token, ttl) = match &response.body {
            Some(Value::String(token)) => (token.trim().to_string(), DEFAULT_TTL_MS),
            Some(Value::Object(obj)) => {
                let token = obj.get("access_token").and_then(Value::as_str).unwrap_or_default().to_string();
                let ttl = obj.get("expires_in").and_then(Value::as_i64).map(|secs| secs.saturating_mul(1000)).unwrap_or(DEFAULT_TTL_MS);
                (token, ttl)
            }
            _ => (String::new(), 0),
        };

        if token.is_empty() {
            return Err(NgsiError::Auth("token response carries no token".to_string()));
        }

        Ok(CachedToken {
            token,
            expires_at: now.saturating_add(ttl),
        })
    }
}

#[async_trait]
impl TokenProvider for PasswordTokenProvider {
    async fn fetch(&self) -> Result<String> {
        let now = time_millis();
        if let Some(cached) = self.cache.get(&self.broker) {
            if cached.expires_at - EXPIRY_MARGIN_MS > now {
                debug!(broker = %self.broker, "using cached token");
                return Ok(cached.token);
            }
        }

        let request = self.token_request();
        let response = self.transport.send(&request).await.map_err(|e| NgsiError::Auth(format!("token request failed: {}", e)))?;
        let token = self.parse_token(&response, now)?;

        info!(broker = %self.broker, idm = self.security.idm_type.as_ref(), "access token refreshed");
        self.cache.set(self.broker.clone(), token.clone());
        Ok(token.token)
    }
}
