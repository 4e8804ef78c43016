pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Four leading zero hex characters.
pub const POW_TARGET_DIFFICULTY: u32 = 16;
pub const PROOF_SEARCH_BATCH: u64 = 1 << 14;
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_PREVIOUS_HASH: &str = "1";
pub const MINING_REWARD: u64 = 1;
pub const MINING_REWARD_SENDER: &str = "0";
