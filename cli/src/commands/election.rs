//! Create-election command

use chrono::NaiveDateTime;
use clap::Args;

use ballotchain_crypto::KeyPair;
use ballotchain_election::{Candidate, Election};
use ballotchain_node::{Payload, Transaction};

use super::{rejection, CliError};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Create an election and submit it to a node
#[derive(Args)]
pub struct CreateElectionCommand {
    /// Election name
    #[arg(long)]
    name: String,

    /// Comma-separated candidate names
    #[arg(long)]
    candidates: String,

    /// Voting opens (YYYY-MM-DD HH:MM, UTC)
    #[arg(long)]
    start: String,

    /// Voting closes (YYYY-MM-DD HH:MM, UTC)
    #[arg(long)]
    end: String,

    /// Node address to submit to
    #[arg(long, default_value = "localhost:5000")]
    node: String,
}

impl CreateElectionCommand {
    pub async fn execute(self) -> Result<(), CliError> {
        let candidates: Vec<&str> = self
            .candidates
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if candidates.len() < 2 {
            return Err(CliError::Usage(
                "at least two candidates are required".into(),
            ));
        }

        let start_time = parse_time(&self.start)?;
        let end_time = parse_time(&self.end)?;
        if start_time >= end_time {
            return Err(CliError::Usage("start must precede end".into()));
        }

        let mut rng = rand::thread_rng();
        // The election keypair encrypts ballots; its secret goes to the
        // operator, never to the chain.
        let election_keys = KeyPair::generate(&mut rng);
        let operator = KeyPair::generate(&mut rng);

        let election = Election {
            id: format!("election-{:x}", chrono::Utc::now().timestamp()),
            name: self.name.clone(),
            candidates: candidates
                .iter()
                .enumerate()
                .map(|(i, name)| Candidate {
                    id: format!("candidate-{}", i + 1),
                    name: (*name).to_string(),
                })
                .collect(),
            start_time,
            end_time,
            public_key: *election_keys.public_key(),
        };
        let election_id = election.id.clone();

        let tx = Transaction::create(Payload::CreateElection(election), &operator, &mut rng);

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("http://{}/transactions", self.node))
            .json(&tx)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }

        println!("Election created: {election_id}");
        println!(
            "Election private key (keep safe, needed for the tally): {}",
            hex::encode(election_keys.secret_key().to_bytes())
        );
        Ok(())
    }
}

fn parse_time(s: &str) -> Result<u64, CliError> {
    let dt = NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|e| CliError::Usage(format!("bad time {s:?}: {e}")))?;
    Ok(dt.and_utc().timestamp() as u64)
}
