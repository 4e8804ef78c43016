use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid peer address: {0:?}")]
    InvalidAddress(String),

    #[error("peer is not registered: {0}")]
    NotFound(String),

    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("proof-of-work search was cancelled")]
    MiningCancelled,
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
