use clap::Parser;
use ledger_core::node::LedgerNode;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod api;
mod constants;
mod peer;

use constants::{DEFAULT_LISTEN, DEFAULT_PEER_TIMEOUT_MS};
use peer::HttpPeerClient;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Identifier credited with mining rewards (random when omitted)
    #[arg(long)]
    node_id: Option<String>,

    /// Timeout per peer request while resolving conflicts, in milliseconds
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_MS)]
    peer_timeout_ms: u64,

    /// Peer to register at startup (repeatable), e.g. http://127.0.0.1:5001
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let node_id = args
        .node_id
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let client = HttpPeerClient::new(Duration::from_millis(args.peer_timeout_ms))?;
    let node = Arc::new(LedgerNode::new(node_id, client));

    for peer in &args.peers {
        match node.register_node(peer) {
            Ok(registered) => info!(peer = %registered, "bootstrap peer registered"),
            Err(err) => warn!(%peer, error = %err, "ignoring bootstrap peer"),
        }
    }

    let app = api::router(node.clone());

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node {} listening on http://{addr}", node.node_id());
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
