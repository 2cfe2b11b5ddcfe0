//! Deterministic keys, accounts and transactions for tests.

use crate::state::{Memory, State, Status};
use turnstile_types::{
    execution::{Account, Fee, Key, Msg, StdTx, Transaction, Value},
    Address, Coins, PrivateKey,
};

pub const CHAIN_ID: &str = "turnstile-test";

/// Recipient used by [send_tx].
pub const SINK: Address = Address::new([0xEE; 20]);

pub fn ed25519_key(seed: u64) -> PrivateKey {
    PrivateKey::ed25519_from_seed(seed)
}

pub fn secp256k1_key(seed: u64) -> PrivateKey {
    PrivateKey::secp256k1_from_seed(seed)
}

/// Account owned by `key` with no key on record yet.
pub fn account(key: &PrivateKey, account_number: u64, sequence: u64, coins: &str) -> Account {
    let mut account = Account::new(
        key.public_key().address(),
        account_number,
        coins.parse::<Coins>().expect("valid coins"),
    );
    account.sequence = sequence;
    account
}

/// A single-signer transfer of `1uiris` to [SINK] paying `fee` for `gas`.
pub fn send_tx(
    key: &PrivateKey,
    account_number: u64,
    sequence: u64,
    fee: &str,
    gas: u64,
) -> Transaction {
    let msgs = vec![Msg::Send {
        from: key.public_key().address(),
        to: SINK,
        amount: Coins::single("uiris", 1),
    }];
    let fee = Fee::new(gas, fee.parse::<Coins>().expect("valid coins"));
    Transaction::Std(StdTx::sign(
        CHAIN_ID,
        msgs,
        fee,
        "",
        &[(key, account_number, sequence)],
    ))
}

/// A [Memory] store holding `accounts`.
pub async fn memory_with(accounts: Vec<Account>) -> Memory {
    let mut state = Memory::default();
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
        .expect("memory apply");
    state
}
