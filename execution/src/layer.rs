use crate::{
    ante::AnteHandler,
    context::{Context, Mode},
    error::Outcome,
    keeper::{FeePool, WorkingSet},
    state::{collected_fees, State, Status},
};
use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use tracing::debug;
use turnstile_types::{
    execution::{Key, Transaction, Value},
    Address,
};

/// Sequential block execution over a pending overlay.
///
/// Each accepted transaction's account writes and collected fees are merged into the overlay
/// before the next transaction runs; rejected transactions leave nothing behind.
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,

    handler: &'a AnteHandler,
    chain_id: String,
    height: u64,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, handler: &'a AnteHandler, chain_id: &str, height: u64) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),

            handler,
            chain_id: chain_id.to_string(),
            height,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    async fn prefetch(&self, tx: &Transaction) -> Result<WorkingSet> {
        let signers = tx.as_std().map(|tx| tx.signers()).unwrap_or_default();
        WorkingSet::load(self, &signers)
            .await
            .context("prefetch signer accounts")
    }

    /// Run `tx` in deliver mode and merge its effects if it is accepted.
    async fn deliver(&mut self, tx: &Transaction) -> Result<Outcome> {
        let mut accounts = self.prefetch(tx).await?;
        let mut fees = FeePool::default();
        let ctx = Context::new(self.chain_id.as_str(), self.height, Mode::Deliver);
        let (_, outcome) = self
            .handler
            .handle(ctx, &mut accounts, &mut fees, tx, false);
        if outcome.abort {
            return Ok(outcome);
        }

        for account in accounts.into_touched() {
            self.insert(Key::Account(account.address), Value::Account(account));
        }
        let fees = fees.into_inner();
        if !fees.is_empty() {
            let total = collected_fees(&*self).await?.saturating_add(&fees);
            self.insert(Key::CollectedFees, Value::CollectedFees(total));
        }
        Ok(outcome)
    }

    /// Execute `transactions` in order.
    ///
    /// Returns one outcome per transaction and, for every account whose sequence advanced, the
    /// next sequence it expects.
    pub async fn execute(
        &mut self,
        transactions: Vec<Transaction>,
    ) -> Result<(Vec<Outcome>, BTreeMap<Address, u64>)> {
        let mut processed_sequences = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(transactions.len());

        for tx in transactions {
            let outcome = self.deliver(&tx).await?;
            if outcome.abort {
                debug!(
                    height = self.height,
                    digest = ?tx.digest(),
                    log = %outcome.log,
                    "dropping rejected transaction"
                );
            } else if let Some(std_tx) = tx.as_std() {
                for (signer, signature) in std_tx.signers().into_iter().zip(&std_tx.signatures) {
                    processed_sequences.insert(signer, signature.sequence.saturating_add(1));
                }
            }
            outcomes.push(outcome);
        }

        Ok((outcomes, processed_sequences))
    }

    /// Evaluate `tx` in simulate mode against the overlay. Nothing is merged.
    pub async fn simulate(&self, tx: &Transaction) -> Result<Outcome> {
        let mut accounts = self.prefetch(tx).await?;
        let mut fees = FeePool::default();
        let ctx = Context::new(self.chain_id.as_str(), self.height, Mode::Deliver);
        let (_, outcome) = self.handler.handle(ctx, &mut accounts, &mut fees, tx, true);
        Ok(outcome)
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await?,
        })
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.pending.insert(key, Status::Update(value));
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.pending.insert(key.clone(), Status::Delete);
        Ok(())
    }
}
