//! Gossip fan-out and chain reconciliation.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use ballotchain_node::{Block, Node, Transaction};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::transport::Transport;

/// P2P configuration
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// This node's own reachable address, excluded from the peer set
    pub self_address: String,
    /// Interval between periodic sync rounds
    pub sync_interval: Duration,
    /// Per-request wall-clock timeout
    pub request_timeout: Duration,
    /// Base backoff applied per consecutive failure of a peer
    pub failure_backoff: Duration,
}

impl P2pConfig {
    pub fn new(self_address: impl Into<String>) -> Self {
        Self {
            self_address: self_address.into(),
            sync_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
            failure_backoff: Duration::from_secs(30),
        }
    }
}

/// The gossip service around one node.
pub struct Network {
    node: Arc<Node>,
    transport: Arc<dyn Transport>,
    config: P2pConfig,
    /// Peers with a sync currently in flight; overlapping syncs coalesce.
    in_flight: Mutex<HashSet<String>>,
    /// Back-reference for spawning one-shot tasks from &self methods.
    self_ref: Weak<Network>,
}

impl Network {
    pub fn new(node: Arc<Node>, transport: Arc<dyn Transport>, config: P2pConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            node,
            transport,
            config,
            in_flight: Mutex::new(HashSet::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn self_address(&self) -> &str {
        &self.config.self_address
    }

    /// Add a peer; idempotent, self-excluding. A new peer gets an immediate
    /// one-shot sync, which is how discovery spreads transitively.
    pub fn add_peer(&self, addr: &str) -> bool {
        if addr.is_empty() || addr == self.config.self_address {
            return false;
        }
        let added = self.node.insert_peer(addr);
        if added {
            if let Some(net) = self.self_ref.upgrade() {
                let peer = addr.to_string();
                tokio::spawn(async move {
                    net.sync_with_peer(&peer).await;
                });
            }
        }
        added
    }

    /// Fan a block out to every known peer. Per-peer failures are logged
    /// and never block the others; there is no acknowledgement.
    pub async fn broadcast_block(&self, block: Block) {
        let peers = self.node.peers();
        let sends = peers.into_iter().map(|peer| {
            let block = block.clone();
            async move {
                match self.transport.send_block(&peer, &block).await {
                    Ok(()) => {}
                    Err(e) if e.is_duplicate() => {
                        debug!(peer, "peer already has block");
                    }
                    Err(e) => warn!(peer, error = %e, "block broadcast failed"),
                }
            }
        });
        join_all(sends).await;
    }

    /// Fan a transaction out to every known peer.
    pub async fn broadcast_transaction(&self, tx: Transaction) {
        let peers = self.node.peers();
        let sends = peers.into_iter().map(|peer| {
            let tx = tx.clone();
            async move {
                match self.transport.send_transaction(&peer, &tx).await {
                    Ok(()) => {}
                    Err(e) if e.is_duplicate() => {
                        debug!(peer, "peer already has transaction");
                    }
                    Err(e) => warn!(peer, error = %e, "transaction broadcast failed"),
                }
            }
        });
        join_all(sends).await;
    }

    /// Reconcile with one peer: adopt its chain if longer and valid, then
    /// merge its peer list. Overlapping syncs to the same peer coalesce;
    /// failing peers are rate-limited, never removed.
    pub async fn sync_with_peer(&self, peer: &str) {
        if !self.begin_sync(peer) {
            return;
        }
        self.sync_inner(peer).await;
        self.end_sync(peer);
    }

    async fn sync_inner(&self, peer: &str) {
        if !self
            .node
            .mark_peer_attempt(peer, self.config.failure_backoff)
        {
            debug!(peer, "peer in failure backoff, skipping sync");
            return;
        }

        let chain = match self.transport.fetch_chain(peer).await {
            Ok(chain) => chain,
            Err(e) => {
                warn!(peer, error = %e, "chain fetch failed");
                self.node.record_peer_failure(peer);
                return;
            }
        };

        if chain.height() > self.node.height() {
            match self.node.replace_chain(chain) {
                Ok(true) => info!(peer, height = self.node.height(), "adopted peer chain"),
                Ok(false) => {}
                Err(e) => warn!(peer, error = %e, "peer chain failed validation"),
            }
        }

        match self.transport.fetch_peers(peer).await {
            Ok(peers) => {
                for addr in peers {
                    self.add_peer(&addr);
                }
            }
            Err(e) => debug!(peer, error = %e, "peer list fetch failed"),
        }

        self.node.record_peer_success(peer);
    }

    /// Periodic sync loop; one round every `sync_interval` until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.sync_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for peer in self.node.peers() {
                        let net = Arc::clone(&self);
                        tokio::spawn(async move {
                            net.sync_with_peer(&peer).await;
                        });
                    }
                }
                _ = shutdown.changed() => {
                    info!("sync loop shutting down");
                    break;
                }
            }
        }
    }

    /// One-shot sync against every known peer, used as a catch-up hint.
    pub async fn sync_all(&self) {
        for peer in self.node.peers() {
            self.sync_with_peer(&peer).await;
        }
    }

    fn begin_sync(&self, peer: &str) -> bool {
        self.in_flight.lock().insert(peer.to_string())
    }

    fn end_sync(&self, peer: &str) {
        self.in_flight.lock().remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use ballotchain_crypto::KeyPair;
    use ballotchain_election::{Candidate, Election};
    use ballotchain_node::{NodeConfig, Payload, Transaction, ValidatorSet};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn election_tx(rng: &mut ChaCha20Rng) -> Transaction {
        let keys = KeyPair::generate(rng);
        let election = Election {
            id: "e1".into(),
            name: "Board".into(),
            candidates: vec![
                Candidate { id: "candidate-1".into(), name: "A".into() },
                Candidate { id: "candidate-2".into(), name: "B".into() },
            ],
            start_time: 1,
            end_time: 4_000_000_000,
            public_key: *keys.public_key(),
        };
        Transaction::create(Payload::CreateElection(election), &keys, rng)
    }

    fn two_node_net(
        rng: &mut ChaCha20Rng,
    ) -> (Arc<Node>, Arc<Node>, Arc<Network>, Arc<Network>) {
        let keypair = KeyPair::generate(rng);
        let validators = ValidatorSet::from_iter([*keypair.public_key()]);

        let a = Arc::new(
            Node::new(keypair, validators.clone(), NodeConfig::validator()).unwrap(),
        );
        let b = Arc::new(
            Node::new(KeyPair::generate(rng), validators, NodeConfig::default()).unwrap(),
        );

        let transport = Arc::new(MemoryTransport::new());
        transport.register("a:1", Arc::clone(&a));
        transport.register("b:1", Arc::clone(&b));
        let t: Arc<dyn Transport> = transport;

        let net_a = Network::new(Arc::clone(&a), Arc::clone(&t), P2pConfig::new("a:1"));
        let net_b = Network::new(Arc::clone(&b), t, P2pConfig::new("b:1"));
        (a, b, net_a, net_b)
    }

    #[tokio::test]
    async fn self_address_is_excluded() {
        let mut rng = ChaCha20Rng::seed_from_u64(140);
        let (_a, _b, net_a, _net_b) = two_node_net(&mut rng);
        assert!(!net_a.add_peer("a:1"));
        assert!(!net_a.add_peer(""));
        assert!(net_a.add_peer("b:1"));
        assert!(!net_a.add_peer("b:1"));
    }

    #[tokio::test]
    async fn broadcast_reaches_peers() {
        let mut rng = ChaCha20Rng::seed_from_u64(141);
        let (a, b, net_a, _net_b) = two_node_net(&mut rng);
        net_a.add_peer("b:1");

        let tx = election_tx(&mut rng);
        a.submit_transaction(tx.clone()).unwrap();
        net_a.broadcast_transaction(tx.clone()).await;
        assert_eq!(b.pending_len(), 1);

        // Rebroadcast is a duplicate on the peer; treated as success.
        net_a.broadcast_transaction(tx).await;
        assert_eq!(b.pending_len(), 1);
    }

    #[tokio::test]
    async fn sync_adopts_longer_chain() {
        let mut rng = ChaCha20Rng::seed_from_u64(142);
        let (a, b, _net_a, net_b) = two_node_net(&mut rng);

        a.submit_transaction(election_tx(&mut rng)).unwrap();
        a.propose_block().unwrap().unwrap();
        assert_eq!(a.height(), 1);
        assert_eq!(b.height(), 0);

        net_b.add_peer("a:1");
        // add_peer spawned a one-shot sync; run one explicitly to avoid
        // depending on scheduling.
        net_b.sync_with_peer("a:1").await;
        assert_eq!(b.height(), 1);
    }

    #[tokio::test]
    async fn sync_merges_peer_lists() {
        let mut rng = ChaCha20Rng::seed_from_u64(143);
        let (a, _b, _net_a, net_b) = two_node_net(&mut rng);

        a.insert_peer("c:1");
        net_b.node().insert_peer("a:1");
        net_b.sync_with_peer("a:1").await;

        let mut peers = net_b.node().peers();
        peers.sort();
        assert_eq!(peers, vec!["a:1".to_string(), "c:1".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_peer_is_recorded_not_removed() {
        let mut rng = ChaCha20Rng::seed_from_u64(144);
        let (_a, _b, net_a, _net_b) = two_node_net(&mut rng);

        net_a.node().insert_peer("ghost:1");
        net_a.sync_with_peer("ghost:1").await;
        assert!(net_a.node().peers().contains(&"ghost:1".to_string()));

        // Second sync is skipped by the failure backoff.
        net_a.sync_with_peer("ghost:1").await;
    }
}
