//! Ledger engine: block hashing, proof-of-work, the chain and its pending pool,
//! chain validation, the peer registry and longest-chain consensus.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod consensus;
pub mod constants;
pub mod error;
pub mod mine;
pub mod node;
pub mod registry;

pub use error::{LedgerError, Result};

/// Fields are declared in lexicographic order; the block hash depends on it.
///
/// `amount` is a whole non-negative number. Fractional or negative amounts fail to
/// decode; beyond that the ledger does not check amounts, addresses or balances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: u64,
    pub recipient: String,
    pub sender: String,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            amount,
            recipient: recipient.into(),
            sender: sender.into(),
        }
    }
}

/// A block does not carry its own hash; it is recomputed from the fields on demand.
/// Fields are declared in lexicographic order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub proof: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> String {
        block_hash(self)
    }
}

/// Canonical bytes of a block: compact JSON with fields in declaration order.
pub fn canonical_bytes(block: &Block) -> Vec<u8> {
    // serde_json only fails on non-string map keys or a failing Serialize impl;
    // Block and Transaction are plain derived structs of strings and numbers.
    serde_json::to_vec(block).expect("block fields always serialize")
}

/// Lowercase hex SHA-256 of the canonical block bytes.
pub fn block_hash(block: &Block) -> String {
    hex::encode(Sha256::digest(canonical_bytes(block)))
}

pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

pub mod pow {
    use super::Block;
    use crate::constants::POW_TARGET_DIFFICULTY;
    use sha2::{Digest, Sha256};

    pub fn proof_digest(last_proof: u64, proof: u64, last_hash: &str) -> [u8; 32] {
        let guess = format!("{last_proof}{proof}{last_hash}");
        Sha256::digest(guess.as_bytes()).into()
    }

    /// True iff the hex digest of `last_proof || proof || last_hash` starts with "0000".
    pub fn valid_proof(last_proof: u64, proof: u64, last_hash: &str) -> bool {
        let digest = proof_digest(last_proof, proof, last_hash);
        count_leading_zero_bits(&digest) >= POW_TARGET_DIFFICULTY
    }

    /// Smallest non-negative proof satisfying `valid_proof` against `last_block`.
    pub fn find_proof(last_block: &Block) -> u64 {
        let last_hash = last_block.hash();
        let mut proof = 0u64;
        while !valid_proof(last_block.proof, proof, &last_hash) {
            proof = proof.wrapping_add(1);
        }
        proof
    }

    pub fn count_leading_zero_bits(hash: &[u8; 32]) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }
}

pub mod chain {
    use super::*;
    use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
    use tracing::debug;

    pub fn genesis_block() -> Block {
        Block {
            index: 1,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            proof: GENESIS_PROOF,
            timestamp: now_secs(),
            transactions: vec![],
        }
    }

    /// The chain plus the pool of transactions waiting for the next block.
    #[derive(Clone, Debug)]
    pub struct Ledger {
        chain: Vec<Block>,
        pending: Vec<Transaction>,
    }

    impl Default for Ledger {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Ledger {
        pub fn new() -> Self {
            Self {
                chain: vec![genesis_block()],
                pending: Vec::new(),
            }
        }

        /// Queue a transaction; returns the index of the block that will hold it.
        pub fn add_transaction(
            &mut self,
            sender: impl Into<String>,
            recipient: impl Into<String>,
            amount: u64,
        ) -> u64 {
            self.pending.push(Transaction::new(sender, recipient, amount));
            self.last_block().index + 1
        }

        /// Drain the pending pool into a new block and append it. A missing or empty
        /// `previous_hash` links to the current last block.
        pub fn mint_block(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
            let previous_hash = previous_hash
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| self.last_block().hash());
            let block = Block {
                index: self.chain.len() as u64 + 1,
                previous_hash,
                proof,
                timestamp: now_secs(),
                transactions: std::mem::take(&mut self.pending),
            };
            self.chain.push(block.clone());
            block
        }

        pub fn last_block(&self) -> &Block {
            // The chain starts with genesis and is never replaced by an empty one.
            &self.chain[self.chain.len() - 1]
        }

        pub fn chain(&self) -> &[Block] {
            &self.chain
        }

        pub(crate) fn len(&self) -> usize {
            self.chain.len()
        }

        pub fn pending(&self) -> &[Transaction] {
            &self.pending
        }

        /// Swap in another chain wholesale. The pending pool is left as is.
        /// Returns false (and keeps the current chain) if `chain` is empty.
        pub fn replace_chain(&mut self, chain: Vec<Block>) -> bool {
            if chain.is_empty() {
                return false;
            }
            self.chain = chain;
            true
        }
    }

    /// Check linkage and proof-of-work of every block after the first. The first block
    /// is trusted as given.
    pub fn is_valid_chain(chain: &[Block]) -> bool {
        for (i, pair) in chain.windows(2).enumerate() {
            let (last, block) = (&pair[0], &pair[1]);
            let last_hash = last.hash();
            if block.previous_hash != last_hash {
                debug!(position = i + 1, "previous_hash does not link");
                return false;
            }
            if !pow::valid_proof(last.proof, block.proof, &last_hash) {
                debug!(position = i + 1, "proof of work does not hold");
                return false;
            }
        }
        true
    }

    /// Decode untrusted JSON into blocks. Missing fields or wrong types yield `None`.
    pub fn decode_chain(value: &serde_json::Value) -> Option<Vec<Block>> {
        Vec::<Block>::deserialize(value).ok()
    }

    /// Validate a chain received as raw JSON; malformed input is simply invalid.
    pub fn is_valid_chain_value(value: &serde_json::Value) -> bool {
        decode_chain(value).is_some_and(|chain| is_valid_chain(&chain))
    }
}
