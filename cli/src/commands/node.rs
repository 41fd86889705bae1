//! Node command - run a ledger node

use clap::Args;

use ballotchain::{FullNode, FullNodeConfig};
use ballotchain_crypto::{KeyPair, PublicKey};
use ballotchain_node::{NodeConfig, ValidatorSet};

use super::CliError;

/// Run a ledger node
#[derive(Args)]
pub struct NodeCommand {
    /// HTTP listen port
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Propose blocks (the node key must be in the permitted set)
    #[arg(long)]
    validator: bool,

    /// Bootstrap peer address, repeatable
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Hex public key of a permitted validator, repeatable
    #[arg(long = "validator-key")]
    validator_keys: Vec<String>,
}

impl NodeCommand {
    pub async fn execute(self) -> Result<(), CliError> {
        let keypair = KeyPair::generate(&mut rand::thread_rng());

        let mut validators = ValidatorSet::new();
        for hex_key in &self.validator_keys {
            let bytes = hex::decode(hex_key)
                .map_err(|e| CliError::Usage(format!("bad validator key: {e}")))?;
            let pk = PublicKey::from_bytes(&bytes)
                .map_err(|e| CliError::Usage(format!("bad validator key: {e}")))?;
            validators.insert(pk);
        }
        // A validator node always trusts its own freshly generated key.
        if self.validator {
            validators.insert(*keypair.public_key());
        }

        let config = FullNodeConfig {
            port: self.port,
            bootstrap_peers: self.peers.clone(),
            node: NodeConfig {
                is_validator: self.validator,
                ..Default::default()
            },
            ..Default::default()
        };

        println!(
            "Node running on port {} (validator: {}, address: {})",
            self.port,
            self.validator,
            ballotchain_crypto::derive_address(keypair.public_key()),
        );
        println!(
            "Node public key: {}",
            hex::encode(keypair.public_key().to_bytes())
        );

        let mut node = FullNode::new(keypair, validators, config)
            .map_err(|e| CliError::Usage(e.to_string()))?;
        node.start()
            .await
            .map_err(|e| CliError::Network(e.to_string()))?;

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| CliError::Usage(e.to_string()))?;
        node.stop().await;
        Ok(())
    }
}
