//! HTTP boundary: wire requests in, node operations out.
//!
//! Handlers deserialize canonical JSON, invoke the node, map the outcome to
//! a status code and - for accepted transactions and blocks - hand the
//! payload to the gossip layer only after the local commit.

mod handlers;
mod server;

pub use server::{ApiConfig, ApiServer, ServeError};
