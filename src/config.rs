use std::{fs, path::Path};

use serde::Deserialize;

use crate::{NgsiError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// http transport config
    #[serde(default)]
    pub http: HttpConfig,
    /// FIWARE services the nodes talk to
    #[serde(default)]
    pub brokers: Vec<BrokerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// request timeout in milliseconds, defaults to 30000
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    30_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

/// The FIWARE Generic Enabler behind a broker endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GeType {
    #[default]
    Orion,
    Comet,
    Quantumleap,
}

impl GeType {
    /// Display name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            GeType::Orion => "Orion",
            GeType::Comet => "STH-Comet",
            GeType::Quantumleap => "QuantumLeap",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// name referenced by node models
    pub name: String,
    /// base url, eg. http://orion:1026
    pub service_url: String,
    #[serde(default)]
    pub ge_type: GeType,
    /// identity management settings, absent means no Authorization header
    #[serde(default)]
    pub security: Option<SecurityConfig>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IdmType {
    #[default]
    Tokenproxy,
    Keyrock,
    Keycloak,
    /// a pre-issued token taken verbatim from `token`
    Static,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub idm_type: IdmType,
    #[serde(default)]
    pub idm_endpoint: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            brokers: Vec::new(),
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| NgsiError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        for broker in &config.brokers {
            if broker.service_url.trim().is_empty() {
                return Err(NgsiError::Config(format!("broker '{}' has an empty service_url", broker.name)));
            }
        }
        Ok(config)
    }

    /// Look up a broker by name.
    pub fn broker(
        &self,
        name: &str,
    ) -> Option<&BrokerConfig> {
        self.brokers.iter().find(|b| b.name == name)
    }
}
