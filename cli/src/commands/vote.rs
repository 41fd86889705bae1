//! Vote command

use clap::Args;

use ballotchain_crypto::KeyPair;
use ballotchain_election::{Ballot, Election};
use ballotchain_node::{CastVote, Payload, Transaction};

use super::{rejection, CliError};

/// Encrypt a ballot and submit it to a node
#[derive(Args)]
pub struct VoteCommand {
    /// Election id
    #[arg(long)]
    election: String,

    /// Candidate name to vote for
    #[arg(long)]
    candidate: String,

    /// Node address to submit to
    #[arg(long, default_value = "localhost:5000")]
    node: String,
}

impl VoteCommand {
    pub async fn execute(self) -> Result<(), CliError> {
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("http://{}/elections/{}", self.node, self.election))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        let election: Election = resp
            .json()
            .await
            .map_err(|e| CliError::Network(e.to_string()))?;

        let vote = election
            .candidate_index(&self.candidate)
            .ok_or_else(|| {
                CliError::Usage(format!(
                    "candidate {:?} is not on the ballot",
                    self.candidate
                ))
            })?;

        let mut rng = rand::thread_rng();
        let voter = KeyPair::generate(&mut rng);
        let ballot = Ballot::seal(
            &election.id,
            &election.public_key,
            vote,
            election.candidate_count(),
            &voter,
            &mut rng,
        )
        .map_err(|e| CliError::Usage(e.to_string()))?;

        let receipt = hex::encode(&ballot.proof[..8]);

        let tx = Transaction::create(
            Payload::CastVote(CastVote {
                election_id: election.id.clone(),
                ballot,
            }),
            &voter,
            &mut rng,
        );

        let resp = client
            .post(format!("http://{}/transactions", self.node))
            .json(&tx)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }

        println!("Vote submitted for {:?}", self.candidate);
        println!("Receipt: {receipt}");
        Ok(())
    }
}
