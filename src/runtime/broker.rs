use std::sync::Arc;

use crate::{
    NgsiError, Result,
    auth::{self, CachedToken, TokenProvider},
    common::MemCache,
    config::{BrokerConfig, GeType},
    transport::HttpTransport,
};

/// A configured FIWARE service endpoint, shared read-only by the nodes bound to it.
#[derive(Clone)]
pub struct Broker {
    pub name: String,
    pub service_url: String,
    pub ge_type: GeType,
    pub token: Option<Arc<dyn TokenProvider>>,
}

impl std::fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("name", &self.name)
            .field("service_url", &self.service_url)
            .field("ge_type", &self.ge_type)
            .field("secured", &self.token.is_some())
            .finish()
    }
}

impl Broker {
    pub fn new(
        name: &str,
        service_url: &str,
        ge_type: GeType,
    ) -> Self {
        Self {
            name: name.to_string(),
            service_url: service_url.trim().trim_end_matches('/').to_string(),
            ge_type,
            token: None,
        }
    }

    pub fn with_token(
        mut self,
        token: Arc<dyn TokenProvider>,
    ) -> Self {
        self.token = Some(token);
        self
    }

    pub fn from_config(
        config: &BrokerConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<MemCache<String, CachedToken>>,
    ) -> Result<Self> {
        let broker = Self::new(&config.name, &config.service_url, config.ge_type);
        match &config.security {
            Some(security) => Ok(broker.with_token(auth::provider_from_config(&config.name, security, transport, cache)?)),
            None => Ok(broker),
        }
    }

    /// Fail unless this broker is the expected Generic Enabler.
    pub fn expect(
        &self,
        ge_type: GeType,
    ) -> Result<&Self> {
        if self.ge_type != ge_type {
            return Err(NgsiError::Config(format!("FIWARE GE type not {}", ge_type.display_name())));
        }
        Ok(self)
    }

    pub fn token(&self) -> Option<&dyn TokenProvider> {
        self.token.as_deref()
    }
}
