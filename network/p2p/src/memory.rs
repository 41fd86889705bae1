//! In-memory transport wiring nodes together without sockets.
//!
//! Test networks register each node under its address; peer calls become
//! direct method calls on the target node.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ballotchain_node::{Block, Chain, Node, NodeError, Transaction};
use parking_lot::RwLock;

use crate::errors::TransportError;
use crate::transport::Transport;

#[derive(Default)]
pub struct MemoryTransport {
    nodes: RwLock<HashMap<String, Arc<Node>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, addr: &str, node: Arc<Node>) {
        self.nodes.write().insert(addr.to_string(), node);
    }

    fn node(&self, addr: &str) -> Result<Arc<Node>, TransportError> {
        self.nodes
            .read()
            .get(addr)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable {
                peer: addr.to_string(),
                message: "no such node".into(),
            })
    }

    fn rejection(peer: &str, err: NodeError) -> TransportError {
        let status = if err.is_duplicate() { 409 } else { 400 };
        TransportError::Rejected {
            peer: peer.to_string(),
            status,
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch_chain(&self, peer: &str) -> Result<Chain, TransportError> {
        Ok(self.node(peer)?.chain_snapshot())
    }

    async fn fetch_peers(&self, peer: &str) -> Result<Vec<String>, TransportError> {
        Ok(self.node(peer)?.peers())
    }

    async fn send_block(&self, peer: &str, block: &Block) -> Result<(), TransportError> {
        self.node(peer)?
            .submit_block(block.clone())
            .map_err(|e| Self::rejection(peer, e))
    }

    async fn send_transaction(&self, peer: &str, tx: &Transaction) -> Result<(), TransportError> {
        self.node(peer)?
            .submit_transaction(tx.clone())
            .map_err(|e| Self::rejection(peer, e))
    }
}
