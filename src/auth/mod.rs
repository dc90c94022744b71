//! Bearer token providers.
//!
//! A broker either has no provider (no `Authorization` header is sent) or
//! one [`TokenProvider`]. Tokens obtained with a password grant are cached
//! per broker until shortly before they expire.

mod password;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    NgsiError, Result,
    common::MemCache,
    config::{IdmType, SecurityConfig},
    transport::HttpTransport,
};

pub use password::{CachedToken, PasswordTokenProvider};

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a bearer token, fetching a fresh one if needed.
    async fn fetch(&self) -> Result<String>;
}

/// A pre-issued token that never changes.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Build the provider described by a broker's security settings.
pub fn provider_from_config(
    broker: &str,
    security: &SecurityConfig,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<MemCache<String, CachedToken>>,
) -> Result<Arc<dyn TokenProvider>> {
    match security.idm_type {
        IdmType::Static => {
            let token = security.token.clone().filter(|t| !t.is_empty()).ok_or_else(|| NgsiError::Config(format!("broker '{}': static token is empty", broker)))?;
            Ok(Arc::new(StaticTokenProvider::new(token)))
        }
        _ => {
            if security.idm_endpoint.trim().is_empty() {
                return Err(NgsiError::Config(format!("broker '{}': idm_endpoint is required", broker)));
            }
            Ok(Arc::new(PasswordTokenProvider::new(broker, security.clone(), transport, cache)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[tokio::test]
    async fn test_static_provider() {
        let security = SecurityConfig {
            idm_type: IdmType::Static,
            token: Some("t0k3n".to_string()),
            ..Default::default()
        };
        let provider = provider_from_config("orion", &security, Arc::new(MockTransport::new()), Arc::new(MemCache::new(8))).unwrap();
        assert_eq!(provider.fetch().await.unwrap(), "t0k3n");
    }

    #[test]
    fn test_missing_settings_rejected() {
        let security = SecurityConfig {
            idm_type: IdmType::Static,
            ..Default::default()
        };
        assert!(provider_from_config("orion", &security, Arc::new(MockTransport::new()), Arc::new(MemCache::new(8))).is_err());

        let security = SecurityConfig {
            idm_type: IdmType::Keyrock,
            ..Default::default()
        };
        let err = provider_from_config("orion", &security, Arc::new(MockTransport::new()), Arc::new(MemCache::new(8))).err().unwrap();
        assert!(err.to_string().contains("idm_endpoint"));
    }
}
