//! Mempool admission.
//!
//! A [Checker] keeps a candidate copy of every account it has seen since the last commit.
//! Candidates start from a read-only snapshot and absorb the sequence and fee effects of each
//! accepted check, so consecutive transactions from one sender are judged against each other
//! instead of against stale committed state.

use crate::{
    ante::AnteHandler,
    context::{Context, Mode},
    error::Outcome,
    keeper::{AccountReader, FeePool, WorkingSet},
};
use anyhow::{Context as _, Result};
#[cfg(feature = "parallel")]
use commonware_runtime::ThreadPool;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::debug;
use turnstile_types::{execution::Transaction, Account, Address, Coins};

#[derive(Default)]
struct Candidate {
    account: Option<Account>,
    loaded: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned slot only means a check panicked before writing back.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Checker<R: AccountReader> {
    base: R,
    handler: AnteHandler,
    chain_id: String,
    height: u64,
    minimum_fees: Coins,

    slots: Mutex<HashMap<Address, Arc<Mutex<Candidate>>>>,
}

impl<R: AccountReader> Checker<R> {
    pub fn new(
        base: R,
        handler: AnteHandler,
        chain_id: &str,
        height: u64,
        minimum_fees: Coins,
    ) -> Self {
        Self {
            base,
            handler,
            chain_id: chain_id.to_string(),
            height,
            minimum_fees,

            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    fn slot(&self, address: &Address) -> Arc<Mutex<Candidate>> {
        lock(&self.slots).entry(*address).or_default().clone()
    }

    fn load(&self, address: &Address, candidate: &mut Candidate) -> Result<()> {
        if !candidate.loaded {
            candidate.account = self
                .base
                .read_account(address)
                .with_context(|| format!("load candidate account {address}"))?;
            candidate.loaded = true;
        }
        Ok(())
    }

    /// Candidate view of `address`: the last accepted check's result, or the snapshot.
    pub fn account(&self, address: &Address) -> Result<Option<Account>> {
        let slot = self.slot(address);
        let mut candidate = lock(&slot);
        self.load(address, &mut candidate)?;
        Ok(candidate.account.clone())
    }

    /// Run the ante handler in check mode against the candidate accounts of `tx`'s signers.
    ///
    /// Signer slots are locked in address order for the whole evaluation, so checks that share
    /// a signer serialize and checks that don't proceed independently. Writes are kept only if
    /// the transaction is accepted.
    pub fn check(&self, tx: &Transaction) -> Result<Outcome> {
        let mut addresses = tx.as_std().map(|tx| tx.signers()).unwrap_or_default();
        addresses.sort();
        addresses.dedup();

        let slots: Vec<_> = addresses.iter().map(|address| self.slot(address)).collect();
        let mut guards: Vec<_> = slots.iter().map(|slot| lock(slot)).collect();

        let mut accounts = WorkingSet::new();
        for (address, candidate) in addresses.iter().zip(guards.iter_mut()) {
            self.load(address, candidate)?;
            if let Some(account) = &candidate.account {
                accounts.insert(account.clone());
            }
        }

        let ctx = Context::new(self.chain_id.as_str(), self.height, Mode::Check)
            .with_minimum_fees(self.minimum_fees.clone());
        let mut fees = FeePool::default();
        let (_, outcome) = self
            .handler
            .handle(ctx, &mut accounts, &mut fees, tx, false);
        if outcome.abort {
            debug!(
                height = self.height,
                digest = ?tx.digest(),
                log = %outcome.log,
                "check failed"
            );
            return Ok(outcome);
        }

        for account in accounts.into_touched() {
            if let Ok(index) = addresses.binary_search(&account.address) {
                guards[index].account = Some(account);
            }
        }
        Ok(outcome)
    }

    fn check_group(
        &self,
        transactions: &[Transaction],
        group: Vec<usize>,
    ) -> Result<Vec<(usize, Outcome)>> {
        group
            .into_iter()
            .map(|index| Ok((index, self.check(&transactions[index])?)))
            .collect()
    }

    /// Check `transactions`, returning outcomes in input order.
    ///
    /// Transactions are grouped by fee payer. Each group is checked in input order; with the
    /// `parallel` feature, groups are spread over `pool`.
    pub fn check_batch(
        &self,
        #[cfg(feature = "parallel")] pool: ThreadPool,
        transactions: &[Transaction],
    ) -> Result<Vec<Outcome>>
    where
        R: Sync,
    {
        let mut groups: BTreeMap<Option<Address>, Vec<usize>> = BTreeMap::new();
        for (index, tx) in transactions.iter().enumerate() {
            let payer = tx.as_std().and_then(|tx| tx.fee_payer());
            groups.entry(payer).or_default().push(index);
        }
        let groups: Vec<Vec<usize>> = groups.into_values().collect();

        #[cfg(feature = "parallel")]
        let checked = pool.install(|| {
            groups
                .into_par_iter()
                .map(|group| self.check_group(transactions, group))
                .collect::<Result<Vec<_>>>()
        })?;
        #[cfg(not(feature = "parallel"))]
        let checked = groups
            .into_iter()
            .map(|group| self.check_group(transactions, group))
            .collect::<Result<Vec<_>>>()?;

        let mut outcomes: Vec<Option<Outcome>> = vec![None; transactions.len()];
        for (index, outcome) in checked.into_iter().flatten() {
            outcomes[index] = Some(outcome);
        }
        Ok(outcomes.into_iter().flatten().collect())
    }

    /// Drop all candidates after a block commit. `base` must reflect the committed state.
    ///
    /// Transactions still waiting for a block must be checked again, in sequence order, for
    /// their effects to reach the new candidates.
    pub fn reset(&mut self, base: R, height: u64) {
        self.base = base;
        self.height = height;
        self.slots = Mutex::new(HashMap::new());
    }
}
