use std::net::SocketAddr;
use std::sync::Arc;

use log::info;

use super::routes::api_routes;
use crate::error_handling::types::WebError;
use crate::ingestion::Coordinator;

/// Web server for the operator API
pub struct WebServer {
    coordinator: Arc<Coordinator>,
    bind_address: [u8; 4],
}

impl WebServer {
    /// Create a new WebServer listening on all interfaces
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            bind_address: [0, 0, 0, 0],
        }
    }

    /// Restrict the listener to loopback
    pub fn local_only(mut self) -> Self {
        self.bind_address = [127, 0, 0, 1];
        self
    }

    /// Start the web server on the given port. Runs until the task is dropped.
    pub async fn start(&self, port: u16) -> Result<(), WebError> {
        let addr: SocketAddr = (self.bind_address, port).into();

        // Fail early on an occupied port instead of inside the server task.
        std::net::TcpListener::bind(addr)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;

        info!("Operator API listening on http://{}", addr);
        warp::serve(api_routes(self.coordinator.clone()))
            .run(addr)
            .await;
        Ok(())
    }
}
