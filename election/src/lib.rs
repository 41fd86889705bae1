//! Election domain types: elections, encrypted ballots and tallies.

pub mod ballot;
pub mod election;
pub mod serde_hex;
pub mod tally;

pub use ballot::Ballot;
pub use election::{Candidate, Election, ElectionError};
pub use tally::{compute_tally, TallyPayload};
