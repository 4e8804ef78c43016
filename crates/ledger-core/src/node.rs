use crate::{
    chain::Ledger,
    consensus::{self, PeerClient},
    constants::{MINING_REWARD, MINING_REWARD_SENDER},
    mine::{find_proof_parallel, CancelToken},
    registry::NodeRegistry,
    Block, LedgerError, Result, Transaction,
};
use parking_lot::Mutex;
use tracing::{debug, info};

/// One ledger instance shared by concurrent callers.
///
/// Chain and pending pool sit behind a single mutex, so adding transactions, minting
/// and chain replacement are serialized. Proof search runs outside the lock against a
/// snapshot of the tip and is re-checked before minting.
pub struct LedgerNode<P: PeerClient> {
    node_id: String,
    ledger: Mutex<Ledger>,
    peers: Mutex<NodeRegistry>,
    client: P,
    mining: Mutex<CancelToken>,
}

impl<P: PeerClient> LedgerNode<P> {
    pub fn new(node_id: impl Into<String>, client: P) -> Self {
        Self {
            node_id: node_id.into(),
            ledger: Mutex::new(Ledger::new()),
            peers: Mutex::new(NodeRegistry::new()),
            client,
            mining: Mutex::new(CancelToken::new()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn add_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> u64 {
        self.ledger.lock().add_transaction(sender, recipient, amount)
    }

    pub fn mint_block(&self, proof: u64, previous_hash: Option<String>) -> Block {
        self.ledger.lock().mint_block(proof, previous_hash)
    }

    /// Find a proof for the current tip, credit the reward and mint the block.
    ///
    /// If the chain moves while searching (another mint or a replacement), the search
    /// is redone on the new tip. Blocks the calling thread for the whole search.
    pub fn mine(&self) -> Result<Block> {
        loop {
            let (last, token) = {
                let ledger = self.ledger.lock();
                (ledger.last_block().clone(), self.mining.lock().clone())
            };

            let found = find_proof_parallel(&last, &token);

            let mut ledger = self.ledger.lock();
            if ledger.last_block() != &last {
                debug!(stale = last.index, "tip moved during proof search, retrying");
                continue;
            }
            let Some(proof) = found else {
                return Err(LedgerError::MiningCancelled);
            };

            ledger.add_transaction(MINING_REWARD_SENDER, self.node_id.as_str(), MINING_REWARD);
            let block = ledger.mint_block(proof, Some(last.hash()));
            info!(
                index = block.index,
                proof,
                transactions = block.transactions.len(),
                "New block forged"
            );
            return Ok(block);
        }
    }

    /// Abandon every proof search in flight.
    pub fn cancel_mining(&self) {
        let mut current = self.mining.lock();
        current.cancel();
        *current = CancelToken::new();
    }

    pub fn last_block(&self) -> Block {
        self.ledger.lock().last_block().clone()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.ledger.lock().chain().to_vec()
    }

    pub fn chain_len(&self) -> usize {
        self.ledger.lock().len()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.ledger.lock().pending().to_vec()
    }

    pub fn register_node(&self, address: &str) -> Result<String> {
        self.peers.lock().register(address)
    }

    pub fn deregister_node(&self, address: &str) -> Result<()> {
        self.peers.lock().deregister(address)
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.lock().list()
    }

    /// Replace the local chain with the longest valid peer chain, if one is longer.
    /// Returns true when the chain was replaced. The pending pool is not touched.
    pub async fn resolve_conflicts(&self) -> bool {
        let peers = self.peers();
        let local_len = self.chain_len();

        let Some(best) = consensus::longest_valid_chain(&self.client, &peers, local_len).await
        else {
            info!(peers = peers.len(), "Our chain is authoritative");
            return false;
        };

        let length = best.len();
        let mut ledger = self.ledger.lock();
        // Local chain may have grown while peers were polled.
        if length <= ledger.len() || !ledger.replace_chain(best) {
            info!(length, local = ledger.len(), "peer chain no longer longer, keeping ours");
            return false;
        }
        // Cancelled under the ledger lock so miners never pair the new tip with a dead token.
        self.cancel_mining();
        info!(length, "Our chain got replaced");
        true
    }
}
