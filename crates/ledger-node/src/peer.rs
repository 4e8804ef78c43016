use crate::constants::CHAIN_PATH;
use ledger_core::{
    consensus::{PeerChain, PeerClient},
    LedgerError, Result,
};
use reqwest::Client;
use std::{fmt::Display, time::Duration};
use tracing::debug;

/// Fetches peer chains over HTTP.
#[derive(Clone, Debug)]
pub struct HttpPeerClient {
    http: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

fn unreachable(peer: &str, err: impl Display) -> LedgerError {
    LedgerError::PeerUnreachable {
        peer: peer.to_string(),
        reason: err.to_string(),
    }
}

impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, peer: &str) -> Result<PeerChain> {
        let url = format!("http://{peer}{CHAIN_PATH}");
        debug!(%url, "requesting peer chain");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unreachable(peer, e))?;
        resp.json::<PeerChain>()
            .await
            .map_err(|e| unreachable(peer, e))
    }
}
