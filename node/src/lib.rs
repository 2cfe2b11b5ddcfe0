use commonware_codec::{DecodeExt, Encode};
use commonware_utils::{from_hex_formatted, hex};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, num::NonZeroUsize, str::FromStr};
use thiserror::Error;
use tracing::Level;
use turnstile_execution::{gas::ParamsError, AnteHandler, AnteParams, GasConfig};
use turnstile_types::{
    execution::{Account, Transaction, MAX_BLOCK_TRANSACTIONS, MAX_CHAIN_ID_LENGTH},
    Address, Coins, CoinsError,
};

pub mod application;
pub mod defaults;

#[derive(Clone, PartialEq, Eq)]
pub struct HexBytes(Vec<u8>);

impl HexBytes {
    pub fn from_hex_formatted(value: &str) -> Option<Self> {
        from_hex_formatted(value).map(Self)
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

impl Serialize for HexBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex(self.as_ref()))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        let bytes = from_hex_formatted(&value)
            .ok_or_else(|| serde::de::Error::custom("expected a hex string"))?;
        Ok(Self(bytes))
    }
}

/// Configuration for the [application::Application].
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub chain_id: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default = "default_check_concurrency")]
    pub check_concurrency: usize,

    /// Mempool fee floor as a coin string (e.g. `10uiris`). Empty disables the floor.
    #[serde(default = "default_minimum_fees")]
    pub minimum_fees: String,
    #[serde(default = "default_max_memo_characters")]
    pub max_memo_characters: usize,

    // Gas cost model.
    #[serde(default = "default_ed25519_verify_cost")]
    pub ed25519_verify_cost: u64,
    #[serde(default = "default_secp256k1_verify_cost")]
    pub secp256k1_verify_cost: u64,
    #[serde(default = "default_gas_base_permille")]
    pub gas_base_permille: u64,
    #[serde(default = "default_gas_shift")]
    pub gas_shift: u64,

    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default = "default_mempool_max_backlog")]
    pub mempool_max_backlog: usize,
    #[serde(default = "default_mempool_max_transactions")]
    pub mempool_max_transactions: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: usize },
    #[error("chain_id must be 1..={max} bytes (got {len})")]
    InvalidChainId { len: usize, max: usize },
    #[error("minimum_fees is invalid: {value}")]
    InvalidMinimumFees {
        value: String,
        #[source]
        source: CoinsError,
    },
    #[error("block_size must be <= {max} (got {value})")]
    BlockSizeTooLarge { value: usize, max: usize },
    #[error("gas parameters are invalid")]
    InvalidGas(#[from] ParamsError),
}

#[derive(Debug)]
pub struct ValidatedConfig {
    pub chain_id: String,

    pub log_level: Level,
    pub log_json: bool,
    pub worker_threads: usize,
    pub check_concurrency: NonZeroUsize,

    pub minimum_fees: Coins,
    pub ante: AnteParams,

    pub block_size: usize,
    pub mempool_max_backlog: usize,
    pub mempool_max_transactions: usize,
}

fn default_log_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_string()
}

fn default_worker_threads() -> usize {
    defaults::DEFAULT_WORKER_THREADS
}

fn default_check_concurrency() -> usize {
    defaults::DEFAULT_CHECK_CONCURRENCY
}

fn default_minimum_fees() -> String {
    defaults::DEFAULT_MINIMUM_FEES.to_string()
}

fn default_max_memo_characters() -> usize {
    defaults::DEFAULT_MAX_MEMO_CHARACTERS
}

fn default_ed25519_verify_cost() -> u64 {
    defaults::DEFAULT_ED25519_VERIFY_COST
}

fn default_secp256k1_verify_cost() -> u64 {
    defaults::DEFAULT_SECP256K1_VERIFY_COST
}

fn default_gas_base_permille() -> u64 {
    defaults::DEFAULT_GAS_BASE_PERMILLE
}

fn default_gas_shift() -> u64 {
    defaults::DEFAULT_GAS_SHIFT
}

fn default_block_size() -> usize {
    defaults::DEFAULT_BLOCK_SIZE
}

fn default_mempool_max_backlog() -> usize {
    defaults::DEFAULT_MEMPOOL_MAX_BACKLOG
}

fn default_mempool_max_transactions() -> usize {
    defaults::DEFAULT_MEMPOOL_MAX_TRANSACTIONS
}

fn ensure_nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn nonzero_usize(field: &'static str, value: usize) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or(ConfigError::InvalidNonZero { field, value })
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        if self.chain_id.is_empty() || self.chain_id.len() > MAX_CHAIN_ID_LENGTH {
            return Err(ConfigError::InvalidChainId {
                len: self.chain_id.len(),
                max: MAX_CHAIN_ID_LENGTH,
            });
        }
        ensure_nonzero("worker_threads", self.worker_threads)?;
        let check_concurrency = nonzero_usize("check_concurrency", self.check_concurrency)?;
        ensure_nonzero("max_memo_characters", self.max_memo_characters)?;
        ensure_nonzero("block_size", self.block_size)?;
        if self.block_size > MAX_BLOCK_TRANSACTIONS {
            return Err(ConfigError::BlockSizeTooLarge {
                value: self.block_size,
                max: MAX_BLOCK_TRANSACTIONS,
            });
        }
        ensure_nonzero("mempool_max_backlog", self.mempool_max_backlog)?;
        ensure_nonzero("mempool_max_transactions", self.mempool_max_transactions)?;

        let minimum_fees = Coins::from_str(&self.minimum_fees).map_err(|source| {
            ConfigError::InvalidMinimumFees {
                value: self.minimum_fees.clone(),
                source,
            }
        })?;

        let ante = AnteParams {
            gas: GasConfig {
                ed25519_verify_cost: self.ed25519_verify_cost,
                secp256k1_verify_cost: self.secp256k1_verify_cost,
                base_permille: self.gas_base_permille,
                shift: self.gas_shift,
            },
            max_memo_characters: self.max_memo_characters,
        };
        // Reject a bad curve here rather than at start-up.
        AnteHandler::new(ante)?;

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        Ok(ValidatedConfig {
            chain_id: self.chain_id,
            log_level,
            log_json: self.log_json,
            worker_threads: self.worker_threads,
            check_concurrency,
            minimum_fees,
            ante,
            block_size: self.block_size,
            mempool_max_backlog: self.mempool_max_backlog,
            mempool_max_transactions: self.mempool_max_transactions,
        })
    }
}

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("account {index} has an invalid address: {value}")]
    InvalidAddress { index: usize, value: String },
    #[error("account {index} has invalid coins: {value}")]
    InvalidCoins {
        index: usize,
        value: String,
        #[source]
        source: CoinsError,
    },
    #[error("account {address} appears more than once")]
    DuplicateAccount { address: Address },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GenesisAccount {
    /// Hex-encoded 20-byte address.
    pub address: String,
    pub coins: String,
    #[serde(default)]
    pub sequence: u64,
}

/// Accounts present before the first block. Account numbers follow list order.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Genesis {
    pub accounts: Vec<GenesisAccount>,
}

impl Genesis {
    pub fn accounts(&self) -> Result<Vec<Account>, GenesisError> {
        let mut seen = BTreeSet::new();
        let mut accounts = Vec::with_capacity(self.accounts.len());
        for (index, entry) in self.accounts.iter().enumerate() {
            let address =
                Address::from_hex(&entry.address).ok_or_else(|| GenesisError::InvalidAddress {
                    index,
                    value: entry.address.clone(),
                })?;
            if !seen.insert(address) {
                return Err(GenesisError::DuplicateAccount { address });
            }
            let coins =
                Coins::from_str(&entry.coins).map_err(|source| GenesisError::InvalidCoins {
                    index,
                    value: entry.coins.clone(),
                    source,
                })?;
            let mut account = Account::new(address, index as u64, coins);
            account.sequence = entry.sequence;
            accounts.push(account);
        }
        Ok(accounts)
    }
}

/// Encoded transactions submitted to the node, one hex string each.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Transactions {
    pub transactions: Vec<HexBytes>,
}

impl Transactions {
    pub fn encode(transactions: &[Transaction]) -> Self {
        Self {
            transactions: transactions
                .iter()
                .map(|tx| HexBytes(tx.encode().to_vec()))
                .collect(),
        }
    }

    pub fn decode(&self) -> Result<Vec<Transaction>, TransactionsError> {
        self.transactions
            .iter()
            .enumerate()
            .map(|(index, bytes)| {
                Transaction::decode(bytes.as_ref())
                    .map_err(|source| TransactionsError { index, source })
            })
            .collect()
    }
}

#[derive(Debug, Error)]
#[error("transaction {index} is invalid")]
pub struct TransactionsError {
    pub index: usize,
    #[source]
    pub source: commonware_codec::Error,
}
