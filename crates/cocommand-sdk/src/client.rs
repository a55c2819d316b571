//! Top-level client handle.

use std::sync::Arc;

use cocommand_core::config::ClientConfig;

use crate::events::EventsApi;
use crate::session::SessionApi;
use crate::transport::Transport;
use crate::workspace::WorkspaceApi;

/// Handle to one backend. Cheap to clone; owned by the application and passed
/// down explicitly rather than kept in a global.
#[derive(Debug, Clone)]
pub struct CocommandClient {
    transport: Arc<Transport>,
}

impl CocommandClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_transport(Transport::new(base_url))
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let transport =
            Transport::new(config.base_url.clone()).with_default_timeout_ms(config.timeout_ms);
        Self::from_transport(transport)
    }

    pub fn from_transport(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn sessions(&self) -> SessionApi<'_> {
        SessionApi::new(&self.transport)
    }

    pub fn events(&self) -> EventsApi<'_> {
        EventsApi::new(&self.transport)
    }

    pub fn workspace(&self) -> WorkspaceApi<'_> {
        WorkspaceApi::new(&self.transport)
    }
}
