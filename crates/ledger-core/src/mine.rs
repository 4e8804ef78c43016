use crate::{constants::PROOF_SEARCH_BATCH, pow::valid_proof, Block};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info};

/// Shared flag that abandons a proof search. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Searches proofs for `last_block` in consecutive batches, each scanned in parallel.
/// `find_first` within a batch and batches in ascending order keep the result the
/// smallest valid proof. Returns `None` once `cancel` is set.
pub fn find_proof_parallel(last_block: &Block, cancel: &CancelToken) -> Option<u64> {
    let last_hash = last_block.hash();
    let last_proof = last_block.proof;
    let mut start = 0u64;

    loop {
        if cancel.is_cancelled() {
            debug!(index = last_block.index, searched = start, "proof search cancelled");
            return None;
        }
        let end = start.saturating_add(PROOF_SEARCH_BATCH);
        let found = (start..end)
            .into_par_iter()
            .find_first(|proof| valid_proof(last_proof, *proof, &last_hash));

        if let Some(proof) = found {
            info!(
                "Found proof {} on top of block {} ({})",
                proof, last_block.index, last_hash
            );
            return Some(proof);
        }
        if end == u64::MAX {
            return None;
        }
        start = end;
    }
}
