//! Wire types shared by the admission pipeline and the node.

pub mod codec;
pub mod coins;
pub mod crypto;
pub mod execution;

pub use coins::{Coin, Coins, CoinsError};
pub use crypto::{Address, PrivateKey, PublicKey};
pub use execution::{
    Account, Fee, Key, Msg, StdSignDoc, StdSignature, StdTx, Transaction, TxError, Value,
};
