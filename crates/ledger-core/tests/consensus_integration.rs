use ledger_core::chain::{is_valid_chain, Ledger};
use ledger_core::consensus::{PeerChain, PeerClient};
use ledger_core::node::LedgerNode;
use ledger_core::{pow, Block, LedgerError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Peers answer from a fixed table; peers missing from the table are unreachable.
#[derive(Default)]
struct MockPeers {
    chains: HashMap<String, PeerChain>,
}

impl MockPeers {
    fn with_chain(mut self, peer: &str, chain: &[Block]) -> Self {
        self.chains.insert(
            peer.to_string(),
            PeerChain {
                length: chain.len() as u64,
                chain: serde_json::to_value(chain).unwrap(),
            },
        );
        self
    }

    fn with_response(mut self, peer: &str, response: PeerChain) -> Self {
        self.chains.insert(peer.to_string(), response);
        self
    }
}

impl PeerClient for MockPeers {
    async fn fetch_chain(&self, peer: &str) -> Result<PeerChain> {
        self.chains
            .get(peer)
            .cloned()
            .ok_or_else(|| LedgerError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "connection refused".into(),
            })
    }
}

fn mined_chain(blocks: usize) -> Vec<Block> {
    let mut ledger = Ledger::new();
    for _ in 0..blocks {
        let proof = pow::find_proof(ledger.last_block());
        ledger.add_transaction("0", "peer", 1);
        ledger.mint_block(proof, None);
    }
    ledger.chain().to_vec()
}

#[tokio::test]
async fn longer_valid_peer_chain_replaces_local() -> anyhow::Result<()> {
    let remote = mined_chain(2);
    let node = LedgerNode::new("local", MockPeers::default().with_chain("10.0.0.1:5000", &remote));
    node.register_node("http://10.0.0.1:5000")?;

    assert!(node.resolve_conflicts().await);
    assert_eq!(node.chain(), remote);
    assert!(is_valid_chain(&node.chain()));
    Ok(())
}

#[tokio::test]
async fn longer_invalid_peer_chain_is_rejected() -> anyhow::Result<()> {
    let mut remote = mined_chain(2);
    remote[2].previous_hash = "forged".into();
    let node = LedgerNode::new("local", MockPeers::default().with_chain("10.0.0.1:5000", &remote));
    node.register_node("10.0.0.1:5000")?;
    let before = node.chain();

    assert!(!node.resolve_conflicts().await);
    assert_eq!(node.chain(), before);
    Ok(())
}

#[tokio::test]
async fn malformed_peer_chain_is_rejected() -> anyhow::Result<()> {
    let response = PeerChain {
        length: 3,
        chain: serde_json::json!([{"index": 1}, {"index": 2}, {"proof": "x"}]),
    };
    let node = LedgerNode::new(
        "local",
        MockPeers::default().with_response("10.0.0.1:5000", response),
    );
    node.register_node("10.0.0.1:5000")?;

    assert!(!node.resolve_conflicts().await);
    assert_eq!(node.chain_len(), 1);
    Ok(())
}

#[tokio::test]
async fn misreported_length_is_rejected() -> anyhow::Result<()> {
    let remote = mined_chain(1);
    let response = PeerChain {
        length: 10,
        chain: serde_json::to_value(&remote)?,
    };
    let node = Arc::new(LedgerNode::new(
        "local",
        MockPeers::default().with_response("10.0.0.1:5000", response),
    ));
    node.register_node("10.0.0.1:5000")?;

    assert!(!node.resolve_conflicts().await);
    assert_eq!(node.chain_len(), 1);
    Ok(())
}

#[tokio::test]
async fn peers_no_longer_than_local_keep_local() -> anyhow::Result<()> {
    let peers = MockPeers::default()
        .with_chain("10.0.0.1:5000", &mined_chain(1))
        .with_chain("10.0.0.2:5000", &mined_chain(0));
    let node = LedgerNode::new("local", peers);
    node.register_node("10.0.0.1:5000")?;
    node.register_node("10.0.0.2:5000")?;
    node.mine()?;
    let before = node.chain();

    assert!(!node.resolve_conflicts().await);
    assert_eq!(node.chain(), before);
    Ok(())
}

#[tokio::test]
async fn unreachable_peer_is_skipped() -> anyhow::Result<()> {
    let remote = mined_chain(2);
    let node = LedgerNode::new("local", MockPeers::default().with_chain("10.0.0.2:5000", &remote));
    node.register_node("10.0.0.1:5000")?; // not in the table
    node.register_node("10.0.0.2:5000")?;

    assert!(node.resolve_conflicts().await);
    assert_eq!(node.chain(), remote);
    Ok(())
}

#[tokio::test]
async fn longest_of_several_valid_chains_wins() -> anyhow::Result<()> {
    let short = mined_chain(1);
    let long = mined_chain(3);
    let peers = MockPeers::default()
        .with_chain("a:1", &short)
        .with_chain("b:1", &long);
    let node = LedgerNode::new("local", peers);
    node.register_node("a:1")?;
    node.register_node("b:1")?;

    assert!(node.resolve_conflicts().await);
    assert_eq!(node.chain(), long);
    Ok(())
}

#[tokio::test]
async fn no_peers_keeps_local_chain() {
    let node = LedgerNode::new("local", MockPeers::default());
    assert!(!node.resolve_conflicts().await);
    assert_eq!(node.chain_len(), 1);
}

#[tokio::test]
async fn replacement_keeps_pending_pool() -> anyhow::Result<()> {
    let remote = mined_chain(2);
    let node = LedgerNode::new("local", MockPeers::default().with_chain("p:1", &remote));
    node.register_node("p:1")?;
    assert_eq!(node.add_transaction("alice", "bob", 9), 2);

    assert!(node.resolve_conflicts().await);
    assert_eq!(node.pending().len(), 1);
    // The pool now targets the block after the adopted tip.
    assert_eq!(node.add_transaction("bob", "carol", 1), 4);
    Ok(())
}

#[tokio::test]
async fn mining_after_replacement_extends_new_tip() -> anyhow::Result<()> {
    let remote = mined_chain(2);
    let node = Arc::new(LedgerNode::new(
        "local",
        MockPeers::default().with_chain("p:1", &remote),
    ));
    node.register_node("p:1")?;
    assert!(node.resolve_conflicts().await);

    let miner = Arc::clone(&node);
    let block = tokio::task::spawn_blocking(move || miner.mine()).await??;
    assert_eq!(block.index, 4);
    assert_eq!(block.previous_hash, remote[2].hash());
    assert!(is_valid_chain(&node.chain()));
    Ok(())
}

/// Two-block chain whose tip needs a long proof search (first valid proof is 400532).
fn slow_tip_chain() -> Vec<Block> {
    let genesis = Block {
        index: 1,
        previous_hash: "1".into(),
        proof: 100,
        timestamp: 1_600_000_000.5,
        transactions: vec![],
    };
    let tip = Block {
        index: 2,
        previous_hash: genesis.hash(),
        proof: 127010,
        timestamp: 1_600_000_067.25,
        transactions: vec![],
    };
    vec![genesis, tip]
}

#[tokio::test]
async fn replacement_during_mining_moves_block_onto_adopted_tip() -> anyhow::Result<()> {
    let slow = slow_tip_chain();
    assert!(is_valid_chain(&slow));
    let longer = mined_chain(3);
    let node = Arc::new(LedgerNode::new(
        "local",
        MockPeers::default()
            .with_chain("a:1", &slow)
            .with_chain("c:1", &longer),
    ));
    node.register_node("a:1")?;
    assert!(node.resolve_conflicts().await);
    assert_eq!(node.last_block(), slow[1]);

    node.register_node("c:1")?;
    let miner = {
        let node = Arc::clone(&node);
        tokio::task::spawn_blocking(move || node.mine())
    };
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert!(node.resolve_conflicts().await);

    let block = miner.await??;
    assert_eq!(block.index, 5);
    assert_eq!(block.previous_hash, longer[3].hash());
    let chain = node.chain();
    assert_eq!(chain.len(), 5);
    assert_eq!(&chain[..4], &longer[..]);
    assert!(is_valid_chain(&chain));
    Ok(())
}

#[test]
fn concurrent_mines_produce_sequential_blocks() {
    let node = Arc::new(LedgerNode::new("local", MockPeers::default()));
    let miners: Vec<_> = (0..2)
        .map(|_| {
            let node = Arc::clone(&node);
            std::thread::spawn(move || node.mine())
        })
        .collect();
    let mut blocks: Vec<Block> = miners
        .into_iter()
        .map(|miner| miner.join().unwrap().unwrap())
        .collect();
    blocks.sort_by_key(|b| b.index);

    assert_eq!(blocks[0].index, 2);
    assert_eq!(blocks[1].index, 3);
    assert_eq!(blocks[1].previous_hash, blocks[0].hash());
    let chain = node.chain();
    assert_eq!(chain.len(), 3);
    assert_eq!(&chain[1..], &blocks[..]);
    assert!(is_valid_chain(&chain));
}

#[test]
fn add_transaction_then_mint_places_exact_transaction() {
    let mut ledger = Ledger::new();
    ledger.add_transaction("alice", "bob", 42);
    let proof = pow::find_proof(ledger.last_block());
    let block = ledger.mint_block(proof, None);
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(block.transactions[0].sender, "alice");
    assert_eq!(block.transactions[0].recipient, "bob");
    assert_eq!(block.transactions[0].amount, 42);
    assert!(ledger.pending().is_empty());
}

#[test]
fn concurrent_adds_during_mining_land_exactly_once() {
    let node = Arc::new(LedgerNode::new("local", MockPeers::default()));
    let writer = {
        let node = Arc::clone(&node);
        std::thread::spawn(move || {
            for i in 0..200u64 {
                node.add_transaction("alice", "bob", i);
            }
        })
    };
    let miner = {
        let node = Arc::clone(&node);
        std::thread::spawn(move || node.mine())
    };
    writer.join().unwrap();
    miner.join().unwrap().unwrap();

    let committed: Vec<u64> = node
        .chain()
        .iter()
        .flat_map(|b| b.transactions.iter())
        .filter(|tx| tx.sender == "alice")
        .map(|tx| tx.amount)
        .collect();
    let pending: Vec<u64> = node.pending().iter().map(|tx| tx.amount).collect();
    let mut all: Vec<u64> = committed.into_iter().chain(pending).collect();
    all.sort();
    assert_eq!(all, (0..200).collect::<Vec<_>>());
}
