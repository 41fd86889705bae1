//! Route handlers.

use std::sync::Arc;

use ballotchain_election::Election;
use ballotchain_node::{Block, Chain, Node, NodeError, Transaction};
use ballotchain_p2p::Network;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::{Deserialize, Serialize};

/// Shared state handed to every handler.
pub struct ApiContext {
    pub node: Arc<Node>,
    pub network: Arc<Network>,
}

/// Machine-readable error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

type ApiError = status::Custom<Json<ErrorBody>>;

fn reject(code: Status, err: &NodeError) -> ApiError {
    status::Custom(
        code,
        Json(ErrorBody {
            error: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
}

fn map_node_error(err: NodeError) -> ApiError {
    let code = match &err {
        NodeError::DuplicateInPool
        | NodeError::DuplicateCommitted
        | NodeError::AlreadyPresent => Status::Conflict,
        NodeError::UnknownParent
        | NodeError::NotValidator
        | NodeError::Invalid(_) => Status::BadRequest,
        NodeError::Fatal(_) => Status::InternalServerError,
    };
    reject(code, &err)
}

#[get("/chain")]
pub fn get_chain(ctx: &State<ApiContext>) -> Json<Chain> {
    Json(ctx.node.chain_snapshot())
}

#[post("/blocks", format = "json", data = "<block>")]
pub fn post_block(ctx: &State<ApiContext>, block: Json<Block>) -> Result<Status, ApiError> {
    let block = block.into_inner();
    match ctx.node.submit_block(block.clone()) {
        Ok(()) => {
            // Propagate only after the local commit.
            let network = Arc::clone(&ctx.network);
            tokio::spawn(async move {
                network.broadcast_block(block).await;
            });
            Ok(Status::Created)
        }
        Err(err @ NodeError::UnknownParent) => {
            // The sender is ahead of us; catch up in the background.
            let network = Arc::clone(&ctx.network);
            tokio::spawn(async move {
                network.sync_all().await;
            });
            Err(map_node_error(err))
        }
        Err(err) => Err(map_node_error(err)),
    }
}

#[post("/transactions", format = "json", data = "<tx>")]
pub fn post_transaction(
    ctx: &State<ApiContext>,
    tx: Json<Transaction>,
) -> Result<Status, ApiError> {
    let tx = tx.into_inner();
    match ctx.node.submit_transaction(tx.clone()) {
        Ok(()) => {
            let network = Arc::clone(&ctx.network);
            tokio::spawn(async move {
                network.broadcast_transaction(tx).await;
            });
            Ok(Status::Created)
        }
        Err(err) => Err(map_node_error(err)),
    }
}

#[get("/transactions")]
pub fn get_transactions(ctx: &State<ApiContext>) -> Json<Vec<Transaction>> {
    Json(ctx.node.pending_transactions())
}

#[get("/peers")]
pub fn get_peers(ctx: &State<ApiContext>) -> Json<Vec<String>> {
    Json(ctx.node.peers())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddPeerRequest {
    pub peer: String,
}

#[post("/addPeer", format = "json", data = "<req>")]
pub fn add_peer(ctx: &State<ApiContext>, req: Json<AddPeerRequest>) -> Result<Status, ApiError> {
    let addr = req.into_inner().peer;
    if addr.is_empty() || addr == ctx.network.self_address() {
        return Err(status::Custom(
            Status::BadRequest,
            Json(ErrorBody {
                error: "malformed".into(),
                message: "peer address is empty or self".into(),
            }),
        ));
    }
    ctx.network.add_peer(&addr);
    Ok(Status::Created)
}

#[get("/elections/<id>")]
pub fn get_election(ctx: &State<ApiContext>, id: &str) -> Option<Json<Election>> {
    ctx.node.election(id).map(Json)
}
