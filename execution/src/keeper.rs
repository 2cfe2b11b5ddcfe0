//! Account and fee accessors used by the ante handler.
//!
//! The handler never touches a store directly. It reads and writes accounts through an
//! [AccountKeeper] (normally a [WorkingSet] prefetched by a driver) and forwards fees to a
//! [FeeCollector]. Drivers decide whether any of it is persisted.

use crate::state::{load_account, State};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use turnstile_types::{execution::Account, Address, Coins};

pub trait AccountKeeper {
    fn get_account(&self, address: &Address) -> Option<Account>;
    fn set_account(&mut self, account: Account);
}

pub trait FeeCollector {
    fn add_collected_fees(&mut self, fees: &Coins);
}

/// Synchronous read access to committed accounts.
pub trait AccountReader {
    fn read_account(&self, address: &Address) -> Result<Option<Account>>;
}

impl<R: AccountReader + ?Sized> AccountReader for &R {
    fn read_account(&self, address: &Address) -> Result<Option<Account>> {
        (**self).read_account(address)
    }
}

/// Per-invocation account snapshots keyed by address.
#[derive(Clone, Debug, Default)]
pub struct WorkingSet {
    accounts: BTreeMap<Address, Account>,
    touched: BTreeSet<Address>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefetch `addresses` from `state`. Missing accounts are simply absent.
    pub async fn load<S: State>(state: &S, addresses: &[Address]) -> Result<Self> {
        let mut set = Self::new();
        for address in addresses {
            if set.accounts.contains_key(address) {
                continue;
            }
            if let Some(account) = load_account(state, address).await? {
                set.insert(account);
            }
        }
        Ok(set)
    }

    /// Seed an account without marking it touched.
    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.address, account);
    }

    pub fn is_touched(&self, address: &Address) -> bool {
        self.touched.contains(address)
    }

    /// Accounts written during the invocation, in address order.
    pub fn into_touched(mut self) -> Vec<Account> {
        self.touched
            .iter()
            .filter_map(|address| self.accounts.remove(address))
            .collect()
    }
}

impl AccountKeeper for WorkingSet {
    fn get_account(&self, address: &Address) -> Option<Account> {
        self.accounts.get(address).cloned()
    }

    fn set_account(&mut self, account: Account) {
        self.touched.insert(account.address);
        self.accounts.insert(account.address, account);
    }
}

/// Fees collected by a single invocation.
#[derive(Clone, Debug, Default)]
pub struct FeePool {
    collected: Coins,
}

impl FeePool {
    pub fn collected(&self) -> &Coins {
        &self.collected
    }

    pub fn into_inner(self) -> Coins {
        self.collected
    }
}

impl FeeCollector for FeePool {
    fn add_collected_fees(&mut self, fees: &Coins) {
        self.collected = self.collected.saturating_add(fees);
    }
}
