//! Wire transport to peers.

use std::time::Duration;

use async_trait::async_trait;
use ballotchain_node::{Block, Chain, Transaction};

use crate::errors::TransportError;

/// How the network layer reaches a peer. Production uses HTTP; tests swap
/// in an in-memory implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> Result<Chain, TransportError>;
    async fn fetch_peers(&self, peer: &str) -> Result<Vec<String>, TransportError>;
    async fn send_block(&self, peer: &str, block: &Block) -> Result<(), TransportError>;
    async fn send_transaction(&self, peer: &str, tx: &Transaction) -> Result<(), TransportError>;
}

/// HTTP transport against the peer's REST endpoints.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with a bounded per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unreachable {
                peer: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    fn unreachable(peer: &str, e: reqwest::Error) -> TransportError {
        TransportError::Unreachable {
            peer: peer.to_string(),
            message: e.to_string(),
        }
    }

    fn check_status(peer: &str, status: reqwest::StatusCode) -> Result<(), TransportError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected {
                peer: peer.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_chain(&self, peer: &str) -> Result<Chain, TransportError> {
        let resp = self
            .client
            .get(format!("http://{peer}/chain"))
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_status(peer, resp.status())?;
        resp.json().await.map_err(|e| TransportError::Malformed {
            peer: peer.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_peers(&self, peer: &str) -> Result<Vec<String>, TransportError> {
        let resp = self
            .client
            .get(format!("http://{peer}/peers"))
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_status(peer, resp.status())?;
        resp.json().await.map_err(|e| TransportError::Malformed {
            peer: peer.to_string(),
            message: e.to_string(),
        })
    }

    async fn send_block(&self, peer: &str, block: &Block) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(format!("http://{peer}/blocks"))
            .json(block)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_status(peer, resp.status())
    }

    async fn send_transaction(&self, peer: &str, tx: &Transaction) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(format!("http://{peer}/transactions"))
            .json(tx)
            .send()
            .await
            .map_err(|e| Self::unreachable(peer, e))?;
        Self::check_status(peer, resp.status())
    }
}
