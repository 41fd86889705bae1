//! API server lifecycle.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use ballotchain_node::Node;
use ballotchain_p2p::Network;
use rocket::{routes, Build, Rocket, Shutdown};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::handlers::{self, ApiContext};

/// API server errors
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("server failed to start: {0}")]
    Startup(String),

    #[error("server is already running")]
    AlreadyRunning,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address
    pub address: IpAddr,
    /// Bind port
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
        }
    }
}

impl ApiConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }
}

/// Build the rocket instance; exposed separately so tests can drive the
/// routes through rocket's local client.
pub fn build_rocket(config: &ApiConfig, node: Arc<Node>, network: Arc<Network>) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", config.address.to_string()))
        .merge(("port", config.port))
        .merge(("cli_colors", false));

    rocket::custom(figment)
        .manage(ApiContext { node, network })
        .mount(
            "/",
            routes![
                handlers::get_chain,
                handlers::post_block,
                handlers::post_transaction,
                handlers::get_transactions,
                handlers::get_peers,
                handlers::add_peer,
                handlers::get_election,
            ],
        )
}

/// The HTTP server around one node.
pub struct ApiServer {
    config: ApiConfig,
    node: Arc<Node>,
    network: Arc<Network>,
    shutdown: Option<Shutdown>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, node: Arc<Node>, network: Arc<Network>) -> Self {
        Self {
            config,
            node,
            network,
            shutdown: None,
            handle: None,
        }
    }

    /// Start serving in a background task.
    pub async fn start(&mut self) -> Result<(), ServeError> {
        if self.handle.is_some() {
            return Err(ServeError::AlreadyRunning);
        }

        let rocket = build_rocket(
            &self.config,
            Arc::clone(&self.node),
            Arc::clone(&self.network),
        );
        let ignited = rocket
            .ignite()
            .await
            .map_err(|e| ServeError::Startup(e.to_string()))?;

        info!(address = %self.config.address, port = self.config.port, "api server listening");

        self.shutdown = Some(ignited.shutdown());
        self.handle = Some(tokio::spawn(async move {
            let _ = ignited.launch().await;
        }));
        Ok(())
    }

    /// Signal shutdown and wait for the server task to finish.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.notify();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
