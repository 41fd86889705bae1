//! Multi-node scenarios over the in-memory transport: gossip fan-out,
//! fork resolution by the longest-chain rule, transitive peer discovery
//! and the periodic sync loop.

use std::sync::Arc;
use std::time::Duration;

use ballotchain::crypto::KeyPair;
use ballotchain::election::{Candidate, Election};
use ballotchain::ledger::{Node, NodeConfig, Payload, Transaction, ValidatorSet};
use ballotchain::p2p::{MemoryTransport, Network, P2pConfig, Transport};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::sync::watch;

struct TestNet {
    transport: Arc<MemoryTransport>,
    validators: ValidatorSet,
    validator_keys: Vec<KeyPair>,
}

impl TestNet {
    fn new(rng: &mut ChaCha20Rng, validator_count: usize) -> Self {
        let validator_keys: Vec<KeyPair> =
            (0..validator_count).map(|_| KeyPair::generate(rng)).collect();
        let validators: ValidatorSet = validator_keys
            .iter()
            .map(|kp| *kp.public_key())
            .collect();
        Self {
            transport: Arc::new(MemoryTransport::new()),
            validators,
            validator_keys,
        }
    }

    /// Spawn a node at `addr`; validator nodes use the i-th shared key.
    fn node(
        &self,
        addr: &str,
        validator: Option<usize>,
        rng: &mut ChaCha20Rng,
    ) -> (Arc<Node>, Arc<Network>) {
        let (keypair, config) = match validator {
            Some(i) => (self.validator_keys[i].clone(), NodeConfig::validator()),
            None => (KeyPair::generate(rng), NodeConfig::default()),
        };
        let node = Arc::new(Node::new(keypair, self.validators.clone(), config).unwrap());
        self.transport.register(addr, Arc::clone(&node));

        let transport: Arc<dyn Transport> = self.transport.clone();
        let network = Network::new(Arc::clone(&node), transport, P2pConfig::new(addr));
        (node, network)
    }
}

fn election_tx(id: &str, rng: &mut ChaCha20Rng) -> Transaction {
    let keys = KeyPair::generate(rng);
    let election = Election {
        id: id.into(),
        name: format!("Election {id}"),
        candidates: vec![
            Candidate {
                id: "candidate-1".into(),
                name: "A".into(),
            },
            Candidate {
                id: "candidate-2".into(),
                name: "B".into(),
            },
        ],
        start_time: 1,
        end_time: 4_000_000_000,
        public_key: *keys.public_key(),
    };
    Transaction::create(Payload::CreateElection(election), &keys, rng)
}

#[tokio::test]
async fn transaction_gossip_reaches_peers() {
    let mut rng = ChaCha20Rng::seed_from_u64(10);
    let net = TestNet::new(&mut rng, 1);
    let (a, net_a) = net.node("a:1", Some(0), &mut rng);
    let (b, _net_b) = net.node("b:1", None, &mut rng);

    net_a.add_peer("b:1");

    let tx = election_tx("e1", &mut rng);
    a.submit_transaction(tx.clone()).unwrap();
    net_a.broadcast_transaction(tx).await;

    assert_eq!(a.pending_len(), 1);
    assert_eq!(b.pending_len(), 1);
}

#[tokio::test]
async fn block_gossip_extends_follower_chains() {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let net = TestNet::new(&mut rng, 1);
    let (a, net_a) = net.node("a:1", Some(0), &mut rng);
    let (b, _net_b) = net.node("b:1", None, &mut rng);

    net_a.add_peer("b:1");

    a.submit_transaction(election_tx("e1", &mut rng)).unwrap();
    let block = a.propose_block().unwrap().unwrap();
    net_a.broadcast_block(block).await;

    assert_eq!(b.height(), 1);
}

#[tokio::test]
async fn fork_resolution_adopts_the_longer_chain() {
    let mut rng = ChaCha20Rng::seed_from_u64(12);
    let net = TestNet::new(&mut rng, 2);
    let (a, _net_a) = net.node("a:1", Some(0), &mut rng);
    let (b, net_b) = net.node("b:1", Some(1), &mut rng);

    // A builds height 4; B builds a different height-1 block (a fork).
    for i in 0..4 {
        a.submit_transaction(election_tx(&format!("a{i}"), &mut rng))
            .unwrap();
        a.propose_block().unwrap().unwrap();
    }
    b.submit_transaction(election_tx("b0", &mut rng)).unwrap();
    b.propose_block().unwrap().unwrap();

    assert_eq!(a.height(), 4);
    assert_eq!(b.height(), 1);
    let b_fork_block = b.chain_snapshot().tip().hash;

    net_b.add_peer("a:1");
    net_b.sync_with_peer("a:1").await;

    assert_eq!(b.height(), 4);
    let b_chain = b.chain_snapshot();
    assert!(!b_chain.contains_block(&b_fork_block), "fork block evicted");
    assert_eq!(b_chain, a.chain_snapshot());

    // B's election from the abandoned branch is gone with it.
    assert!(b.election("b0").is_none());
    assert!(b.election("a0").is_some());
}

#[tokio::test]
async fn equal_height_keeps_the_local_chain() {
    let mut rng = ChaCha20Rng::seed_from_u64(13);
    let net = TestNet::new(&mut rng, 2);
    let (a, _net_a) = net.node("a:1", Some(0), &mut rng);
    let (b, net_b) = net.node("b:1", Some(1), &mut rng);

    a.submit_transaction(election_tx("a0", &mut rng)).unwrap();
    a.propose_block().unwrap().unwrap();
    b.submit_transaction(election_tx("b0", &mut rng)).unwrap();
    b.propose_block().unwrap().unwrap();

    let b_tip = b.chain_snapshot().tip().hash;
    net_b.add_peer("a:1");
    net_b.sync_with_peer("a:1").await;

    // Same height: tie favors local.
    assert_eq!(b.chain_snapshot().tip().hash, b_tip);
}

#[tokio::test]
async fn peer_discovery_is_transitive() {
    let mut rng = ChaCha20Rng::seed_from_u64(14);
    let net = TestNet::new(&mut rng, 1);
    let (_a, net_a) = net.node("a:1", Some(0), &mut rng);
    let (b, _net_b) = net.node("b:1", None, &mut rng);
    let (_c, _net_c) = net.node("c:1", None, &mut rng);

    // B already knows C; A learns about C through B.
    b.insert_peer("c:1");
    net_a.add_peer("b:1");
    net_a.sync_with_peer("b:1").await;

    let mut peers = net_a.node().peers();
    peers.sort();
    assert_eq!(peers, vec!["b:1".to_string(), "c:1".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_sync_loop_converges_and_shuts_down() {
    let mut rng = ChaCha20Rng::seed_from_u64(15);
    let net = TestNet::new(&mut rng, 1);
    let (a, _net_a) = net.node("a:1", Some(0), &mut rng);
    let (b, _) = net.node("b:1", None, &mut rng);

    a.submit_transaction(election_tx("e1", &mut rng)).unwrap();
    a.propose_block().unwrap().unwrap();

    // B runs a fast periodic loop against A.
    b.insert_peer("a:1");
    let transport: Arc<dyn Transport> = net.transport.clone();
    let mut config = P2pConfig::new("b:1");
    config.sync_interval = Duration::from_millis(20);
    let net_b = Network::new(Arc::clone(&b), transport, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_task = tokio::spawn(Arc::clone(&net_b).run(shutdown_rx));

    // Give the loop a few ticks to converge.
    for _ in 0..50 {
        if b.height() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(b.height(), 1);

    shutdown_tx.send(true).unwrap();
    loop_task.await.unwrap();
}
