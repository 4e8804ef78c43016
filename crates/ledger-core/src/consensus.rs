//! Longest-valid-chain resolution against registered peers.
use crate::{chain, Block, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

/// What a peer reports from its chain endpoint. The chain is kept as raw JSON so a
/// malformed chain is a validation failure rather than a decoding error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerChain {
    pub length: u64,
    pub chain: serde_json::Value,
}

/// Network collaborator used to fetch a peer's chain. Transport failures and
/// non-success responses are reported as `LedgerError::PeerUnreachable`.
pub trait PeerClient: Send + Sync {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<PeerChain>> + Send;
}

/// Polls every peer concurrently and returns the longest chain that is longer than
/// `local_len` and passes validation. Unreachable peers are skipped.
pub async fn longest_valid_chain<P: PeerClient>(
    client: &P,
    peers: &[String],
    local_len: usize,
) -> Option<Vec<Block>> {
    let requests: Vec<_> = peers
        .iter()
        .map(|peer| async move { (peer, client.fetch_chain(peer).await) })
        .collect();
    let responses = join_all(requests).await;

    let mut max_length = local_len as u64;
    let mut best = None;

    for (peer, response) in responses {
        let remote = match response {
            Ok(remote) => remote,
            Err(err) => {
                warn!(%peer, error = %err, "skipping peer");
                continue;
            }
        };
        if remote.length <= max_length {
            debug!(%peer, length = remote.length, max_length, "peer chain is not longer");
            continue;
        }
        let valid = chain::decode_chain(&remote.chain).filter(|blocks| {
            blocks.len() as u64 == remote.length && chain::is_valid_chain(blocks)
        });
        match valid {
            Some(blocks) => {
                info!(%peer, length = remote.length, "found longer valid chain");
                max_length = remote.length;
                best = Some(blocks);
            }
            None => warn!(%peer, length = remote.length, "rejected invalid chain"),
        }
    }
    best
}
