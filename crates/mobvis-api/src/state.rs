use std::sync::Arc;

use mobvis_core::GaitEngine;

use crate::config::EndpointConfig;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn GaitEngine>,
    pub endpoint: Arc<EndpointConfig>,
}

impl AppState {
    pub fn new(engine: Arc<dyn GaitEngine>, endpoint: EndpointConfig) -> Self {
        Self {
            engine,
            endpoint: Arc::new(endpoint),
        }
    }
}
