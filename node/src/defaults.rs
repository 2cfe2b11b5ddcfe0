//! Defaults for optional configuration fields.

use turnstile_execution::ante::DEFAULT_MAX_MEMO_CHARACTERS as ANTE_MAX_MEMO_CHARACTERS;
use turnstile_types::execution::MAX_BLOCK_TRANSACTIONS;

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_WORKER_THREADS: usize = 2;
pub const DEFAULT_CHECK_CONCURRENCY: usize = 4;

/// No floor: every fee clears the mempool check.
pub const DEFAULT_MINIMUM_FEES: &str = "";
pub const DEFAULT_MAX_MEMO_CHARACTERS: usize = ANTE_MAX_MEMO_CHARACTERS;

pub const DEFAULT_ED25519_VERIFY_COST: u64 = 59;
pub const DEFAULT_SECP256K1_VERIFY_COST: u64 = 100;
/// 1.02 in thousandths.
pub const DEFAULT_GAS_BASE_PERMILLE: u64 = 1_020;
pub const DEFAULT_GAS_SHIFT: u64 = 285;

pub const DEFAULT_BLOCK_SIZE: usize = MAX_BLOCK_TRANSACTIONS;
pub const DEFAULT_MEMPOOL_MAX_BACKLOG: usize = 64;
pub const DEFAULT_MEMPOOL_MAX_TRANSACTIONS: usize = 100_000;
