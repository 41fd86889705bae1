//! Full node integration.
//!
//! Ties the state machine, gossip layer and HTTP boundary together and owns
//! the background tasks: the block proposer loop, the periodic sync loop
//! and the shutdown signal they all observe.

use std::sync::Arc;
use std::time::Duration;

use ballotchain_crypto::KeyPair;
use ballotchain_node::{Node, NodeConfig, NodeError, ValidatorSet};
use ballotchain_p2p::{HttpTransport, Network, P2pConfig, Transport};
use ballotchain_rpc::{ApiConfig, ApiServer, ServeError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Errors during full-node startup and operation
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Api(#[from] ServeError),

    #[error("transport setup failed: {0}")]
    Transport(String),
}

/// Full node configuration
#[derive(Debug, Clone)]
pub struct FullNodeConfig {
    /// HTTP listen port; also the advertised peer address port
    pub port: u16,
    /// Host peers use to reach this node
    pub host: String,
    /// Peers to contact at startup
    pub bootstrap_peers: Vec<String>,
    /// State machine configuration
    pub node: NodeConfig,
    /// Interval between periodic sync rounds
    pub sync_interval: Duration,
    /// Per-request timeout towards peers
    pub request_timeout: Duration,
}

impl Default for FullNodeConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "localhost".into(),
            bootstrap_peers: Vec::new(),
            node: NodeConfig::default(),
            sync_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl FullNodeConfig {
    /// The address peers dial for this node.
    pub fn self_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A running node: state machine + gossip + HTTP boundary.
pub struct FullNode {
    node: Arc<Node>,
    network: Arc<Network>,
    api: ApiServer,
    config: FullNodeConfig,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl FullNode {
    /// Wire up a node over the HTTP transport.
    pub fn new(
        keypair: KeyPair,
        validators: ValidatorSet,
        config: FullNodeConfig,
    ) -> Result<Self, RuntimeError> {
        let transport = HttpTransport::new(config.request_timeout)
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;
        Self::with_transport(keypair, validators, config, Arc::new(transport))
    }

    /// Wire up a node over any transport; tests pass an in-memory one.
    pub fn with_transport(
        keypair: KeyPair,
        validators: ValidatorSet,
        config: FullNodeConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RuntimeError> {
        let node = Arc::new(Node::new(keypair, validators, config.node.clone())?);

        let mut p2p_config = P2pConfig::new(config.self_address());
        p2p_config.sync_interval = config.sync_interval;
        p2p_config.request_timeout = config.request_timeout;
        let network = Network::new(Arc::clone(&node), transport, p2p_config);

        let api = ApiServer::new(
            ApiConfig::with_port(config.port),
            Arc::clone(&node),
            Arc::clone(&network),
        );

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            node,
            network,
            api,
            config,
            shutdown_tx,
            tasks: Vec::new(),
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// Start the HTTP server and the background loops, then dial the
    /// bootstrap peers.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        self.api.start().await?;

        // Periodic chain sync.
        let sync_task = tokio::spawn(
            Arc::clone(&self.network).run(self.shutdown_tx.subscribe()),
        );
        self.tasks.push(sync_task);

        // Block proposer: waits for coalesced triggers from the state
        // machine, proposes, then broadcasts outside the node lock.
        if self.node.is_validator() {
            let node = Arc::clone(&self.node);
            let network = Arc::clone(&self.network);
            let mut shutdown = self.shutdown_tx.subscribe();
            let threshold = self.config.node.proposal_threshold;
            self.tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = node.proposal_trigger().notified() => {
                            match node.propose_block() {
                                Ok(Some(block)) => {
                                    network.broadcast_block(block).await;
                                    // Capacity may have left enough behind
                                    // for another round.
                                    if node.pending_len() >= threshold {
                                        node.proposal_trigger().notify_one();
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => warn!(error = %e, "block proposal failed"),
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        for peer in self.config.bootstrap_peers.clone() {
            self.network.add_peer(&peer);
        }

        info!(
            address = self.node.address(),
            port = self.config.port,
            validator = self.node.is_validator(),
            "node started"
        );
        Ok(())
    }

    /// Stop every background task and the HTTP server.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.api.stop().await;
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("node stopped");
    }
}
