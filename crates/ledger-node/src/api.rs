use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{consensus::PeerClient, node::LedgerNode, Block, LedgerError, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::constants::CHAIN_PATH;

type SharedNode<P> = Arc<LedgerNode<P>>;

pub fn router<P: PeerClient + 'static>(node: SharedNode<P>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/mine", get(mine::<P>))
        .route("/transactions/new", post(new_transaction::<P>))
        .route(CHAIN_PATH, get(full_chain::<P>))
        .route("/nodes", get(list_nodes::<P>))
        .route("/nodes/register", post(register_nodes::<P>))
        .route("/nodes/deregister", post(deregister_nodes::<P>))
        .route("/nodes/resolve", get(resolve::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

#[derive(Debug)]
enum ApiError {
    Ledger(LedgerError),
    BadRequest(String),
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(err @ LedgerError::InvalidAddress(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Ledger(err @ LedgerError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Ledger(err @ LedgerError::MiningCancelled) => {
                (StatusCode::CONFLICT, err.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            // Peer failures are absorbed by resolve; anything else reaching here is a bug.
            ApiError::Ledger(err) => {
                let message = err.to_string();
                error!(%message, "unexpected ledger error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            ApiError::Internal(message) => {
                error!(%message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct MineResponse {
    message: &'static str,
    index: u64,
    transactions: Vec<Transaction>,
    proof: u64,
    previous_hash: String,
}

#[derive(Debug, Deserialize)]
struct TxIn {
    sender: String,
    recipient: String,
    amount: u64,
}

#[derive(Debug, Serialize)]
struct TxAccepted {
    message: String,
    index: u64,
}

#[derive(Debug, Serialize)]
struct ChainResponse {
    chain: Vec<Block>,
    length: usize,
}

#[derive(Debug, Deserialize)]
struct NodesIn {
    #[serde(default)]
    nodes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NodesResponse {
    message: &'static str,
    total_nodes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    message: &'static str,
    replaced: bool,
    chain: Vec<Block>,
}

async fn mine<P: PeerClient + 'static>(
    State(node): State<SharedNode<P>>,
) -> Result<Json<MineResponse>, ApiError> {
    let block = tokio::task::spawn_blocking(move || node.mine())
        .await
        .map_err(|e| ApiError::Internal(format!("mining task failed: {e}")))??;

    Ok(Json(MineResponse {
        message: "New block forged",
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

async fn new_transaction<P: PeerClient + 'static>(
    State(node): State<SharedNode<P>>,
    payload: Result<Json<TxIn>, JsonRejection>,
) -> Result<(StatusCode, Json<TxAccepted>), ApiError> {
    let Json(tx) = payload.map_err(|e| ApiError::BadRequest(format!("Missing values: {e}")))?;
    let index = node.add_transaction(tx.sender, tx.recipient, tx.amount);
    Ok((
        StatusCode::CREATED,
        Json(TxAccepted {
            message: format!("Transaction will be added to Block {index}"),
            index,
        }),
    ))
}

async fn full_chain<P: PeerClient + 'static>(
    State(node): State<SharedNode<P>>,
) -> Json<ChainResponse> {
    let chain = node.chain();
    Json(ChainResponse {
        length: chain.len(),
        chain,
    })
}

async fn list_nodes<P: PeerClient + 'static>(
    State(node): State<SharedNode<P>>,
) -> Json<NodesResponse> {
    Json(NodesResponse {
        message: "All registered nodes",
        total_nodes: node.peers(),
    })
}

fn node_list(payload: Result<Json<NodesIn>, JsonRejection>) -> Result<Vec<String>, ApiError> {
    match payload {
        Ok(Json(NodesIn { nodes })) if !nodes.is_empty() => Ok(nodes),
        _ => Err(ApiError::BadRequest(
            "Please supply a valid list of nodes".to_string(),
        )),
    }
}

async fn register_nodes<P: PeerClient + 'static>(
    State(node): State<SharedNode<P>>,
    payload: Result<Json<NodesIn>, JsonRejection>,
) -> Result<(StatusCode, Json<NodesResponse>), ApiError> {
    for address in node_list(payload)? {
        node.register_node(&address)?;
    }
    Ok((
        StatusCode::CREATED,
        Json(NodesResponse {
            message: "New nodes have been added",
            total_nodes: node.peers(),
        }),
    ))
}

async fn deregister_nodes<P: PeerClient + 'static>(
    State(node): State<SharedNode<P>>,
    payload: Result<Json<NodesIn>, JsonRejection>,
) -> Result<(StatusCode, Json<NodesResponse>), ApiError> {
    for address in node_list(payload)? {
        node.deregister_node(&address)?;
    }
    Ok((
        StatusCode::CREATED,
        Json(NodesResponse {
            message: "Nodes de-registered",
            total_nodes: node.peers(),
        }),
    ))
}

async fn resolve<P: PeerClient + 'static>(
    State(node): State<SharedNode<P>>,
) -> Json<ResolveResponse> {
    let replaced = node.resolve_conflicts().await;
    Json(ResolveResponse {
        message: if replaced {
            "Our chain got replaced"
        } else {
            "Our chain is authoritative"
        },
        replaced,
        chain: node.chain(),
    })
}
