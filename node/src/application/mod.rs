//! Admission and block production over an in-process store.

use crate::ValidatedConfig;
use anyhow::{Context as _, Result};
use commonware_runtime::{Metrics, ThreadPool};
use tracing::{debug, info, warn};
use turnstile_execution::{
    state_transition::{execute_state_transition, StateTransitionResult},
    AnteHandler, Checker, Memory, Outcome, State, Status,
};
use turnstile_types::{
    execution::{Account, Key, Transaction, Value},
    Coins,
};

mod mempool;
pub use mempool::Mempool;

/// Configuration for the application.
pub struct Config {
    pub chain_id: String,

    /// Fee floor enforced when admitting transactions.
    pub minimum_fees: Coins,

    pub handler: AnteHandler,

    /// Maximum number of transactions per block.
    pub block_size: usize,

    /// The maximum number of transactions a single account can have in the mempool.
    pub mempool_max_backlog: usize,

    /// The maximum number of transactions in the mempool.
    pub mempool_max_transactions: usize,
}

impl Config {
    pub fn from_validated(config: &ValidatedConfig) -> Result<Self> {
        let handler = AnteHandler::new(config.ante).context("invalid gas parameters")?;
        Ok(Self {
            chain_id: config.chain_id.clone(),
            minimum_fees: config.minimum_fees.clone(),
            handler,
            block_size: config.block_size,
            mempool_max_backlog: config.mempool_max_backlog,
            mempool_max_transactions: config.mempool_max_transactions,
        })
    }
}

pub struct Application {
    chain_id: String,
    handler: AnteHandler,
    block_size: usize,

    state: Memory,
    /// Candidate accounts for admission, over a snapshot of `state` at the last commit.
    checker: Checker<Memory>,
    mempool: Mempool,
    /// Next height to execute.
    height: u64,
}

impl Application {
    /// Seed the store with `accounts` and commit them as the genesis block (height 0).
    pub async fn init(
        context: impl Metrics,
        config: Config,
        accounts: Vec<Account>,
    ) -> Result<Self> {
        let mut state = Memory::default();
        let count = accounts.len();
        state
            .apply(
                accounts
                    .into_iter()
                    .map(|account| {
                        (
                            Key::Account(account.address),
                            Status::Update(Value::Account(account)),
                        )
                    })
                    .collect(),
            )
            .await
            .context("apply genesis accounts")?;
        execute_state_transition(&mut state, &config.handler, &config.chain_id, 0, Vec::new())
            .await
            .context("commit genesis")?;
        info!(accounts = count, chain_id = %config.chain_id, "initialized genesis");

        let checker = Checker::new(
            state.clone(),
            config.handler.clone(),
            &config.chain_id,
            1,
            config.minimum_fees,
        );
        let mempool = Mempool::new_with_limits(
            context.with_label("mempool"),
            config.mempool_max_backlog,
            config.mempool_max_transactions,
        );
        Ok(Self {
            chain_id: config.chain_id,
            handler: config.handler,
            block_size: config.block_size,
            state,
            checker,
            mempool,
            height: 1,
        })
    }

    pub fn state(&self) -> &Memory {
        &self.state
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Check `transactions` against the candidate accounts and queue the accepted ones.
    ///
    /// Returns one outcome per transaction, in input order.
    pub fn admit(
        &mut self,
        pool: ThreadPool,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Outcome>> {
        let outcomes = self
            .checker
            .check_batch(pool, &transactions)
            .context("check transactions")?;
        for (tx, outcome) in transactions.into_iter().zip(&outcomes) {
            if !outcome.is_ok() {
                warn!(
                    digest = ?tx.digest(),
                    code = outcome.kind().map(|kind| kind.code()),
                    log = %outcome.log,
                    "rejected transaction"
                );
                continue;
            }
            let digest = tx.digest();
            if !self.mempool.add(tx) {
                debug!(?digest, "mempool full or duplicate");
            }
        }
        Ok(outcomes)
    }

    /// Execute the next block from the mempool. Returns `None` if the mempool is empty.
    pub async fn produce_block(&mut self) -> Result<Option<StateTransitionResult>> {
        let mut block = Vec::with_capacity(self.block_size);
        while block.len() < self.block_size {
            let Some(tx) = self.mempool.next() else {
                break;
            };
            block.push(tx);
        }
        if block.is_empty() {
            return Ok(None);
        }

        let result = execute_state_transition(
            &mut self.state,
            &self.handler,
            &self.chain_id,
            self.height,
            block,
        )
        .await?;
        for outcome in result.outcomes.iter().filter(|outcome| !outcome.is_ok()) {
            warn!(height = result.height, log = %outcome.log, "transaction failed in block");
        }
        for (address, next) in &result.processed_sequences {
            self.mempool.retain(address, *next);
        }

        self.height += 1;
        self.checker.reset(self.state.clone(), self.height);
        self.recheck()?;
        Ok(Some(result))
    }

    /// Replay the mempool through the fresh candidates so pending sequence and fee effects stay
    /// visible to later admissions. Transactions that no longer pass are evicted.
    fn recheck(&mut self) -> Result<()> {
        let pending = self.mempool.drain();
        let total = pending.len();
        let mut evicted = 0;
        for tx in pending {
            let outcome = self.checker.check(&tx).context("recheck transaction")?;
            if !outcome.is_ok() {
                debug!(
                    digest = ?tx.digest(),
                    log = %outcome.log,
                    "evicted transaction on recheck"
                );
                evicted += 1;
                continue;
            }
            self.mempool.add(tx);
        }
        if evicted > 0 {
            info!(height = self.height, total, evicted, "rechecked mempool");
        }
        Ok(())
    }
}
