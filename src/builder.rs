use std::sync::Arc;

use crate::{
    Config, Engine, Result,
    transport::{HttpTransport, ReqwestTransport},
};

#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    /// Replace the reqwest transport, eg. with a recording one in tests.
    pub fn transport(
        mut self,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(&self) -> Result<Engine> {
        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(ReqwestTransport::new(self.config.http.timeout)),
        };
        Engine::new(&self.config, transport)
    }
}
