//! Multi-denomination coin amounts.
//!
//! [Coins] keeps its entries sorted by denomination with no duplicates and no zero amounts.
//! Values decoded from the wire are not trusted to uphold that, so every entry point that
//! accepts external coins must call [Coins::is_valid].

use crate::codec::{read_string, read_u128, string_encode_size, write_string, write_u128};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadRangeExt, Write};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};
use thiserror::Error as ThisError;

pub const MIN_DENOM_LENGTH: usize = 3;
pub const MAX_DENOM_LENGTH: usize = 16;
pub const MAX_COINS: usize = 32;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum CoinsError {
    #[error("invalid coin expression: {0}")]
    InvalidExpression(String),
    #[error("invalid denomination: {0}")]
    InvalidDenom(String),
    #[error("duplicate denomination: {0}")]
    DuplicateDenom(String),
    #[error("too many denominations: {0}")]
    TooMany(usize),
}

/// Returns true if `denom` starts with a lowercase letter and continues with lowercase
/// letters, digits or `-`.
pub fn is_valid_denom(denom: &str) -> bool {
    let bytes = denom.as_bytes();
    if bytes.len() < MIN_DENOM_LENGTH || bytes.len() > MAX_DENOM_LENGTH {
        return false;
    }
    bytes[0].is_ascii_lowercase()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = CoinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| CoinsError::InvalidExpression(s.to_string()))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(CoinsError::InvalidExpression(s.to_string()));
        }
        let amount = amount
            .parse::<u128>()
            .map_err(|_| CoinsError::InvalidExpression(s.to_string()))?;
        if !is_valid_denom(denom) {
            return Err(CoinsError::InvalidDenom(denom.to_string()));
        }
        Ok(Self::new(denom, amount))
    }
}

impl Write for Coin {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.denom, writer);
        write_u128(self.amount, writer);
    }
}

impl Read for Coin {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let denom = read_string(reader, MAX_DENOM_LENGTH)?;
        let amount = read_u128(reader)?;
        Ok(Self { denom, amount })
    }
}

impl EncodeSize for Coin {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.denom) + 16
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Build a sanitized set: zero amounts dropped, entries sorted by denomination.
    ///
    /// Duplicate denominations are kept so that [Coins::is_valid] can reject them.
    pub fn new(mut coins: Vec<Coin>) -> Self {
        coins.retain(|coin| coin.amount > 0);
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        Self(coins)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Shorthand for a single-denomination amount.
    pub fn single(denom: impl Into<String>, amount: u128) -> Self {
        Self::new(vec![Coin::new(denom, amount)])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if every amount is zero (including the empty set).
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|coin| coin.amount == 0)
    }

    /// Sorted, unique, valid denominations with strictly positive amounts.
    pub fn is_valid(&self) -> bool {
        if self.0.len() > MAX_COINS {
            return false;
        }
        let well_formed = self
            .0
            .iter()
            .all(|coin| coin.amount > 0 && is_valid_denom(&coin.denom));
        let sorted = self
            .0
            .windows(2)
            .all(|pair| pair[0].denom.cmp(&pair[1].denom) == Ordering::Less);
        well_formed && sorted
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .iter()
            .find(|coin| coin.denom == denom)
            .map(|coin| coin.amount)
            .unwrap_or(0)
    }

    /// True if, for every denomination in `other`, `self` holds at least as much.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other
            .0
            .iter()
            .all(|coin| self.amount_of(&coin.denom) >= coin.amount)
    }

    /// Subtract `other`, returning `None` if any denomination would go negative.
    pub fn safe_sub(&self, other: &Coins) -> Option<Coins> {
        let mut result = self.0.clone();
        for coin in &other.0 {
            if coin.amount == 0 {
                continue;
            }
            let entry = result.iter_mut().find(|held| held.denom == coin.denom)?;
            entry.amount = entry.amount.checked_sub(coin.amount)?;
        }
        Some(Self::new(result))
    }

    /// Add `other`, saturating each denomination at `u128::MAX`.
    pub fn saturating_add(&self, other: &Coins) -> Coins {
        let mut result = self.0.clone();
        for coin in &other.0 {
            match result.iter_mut().find(|held| held.denom == coin.denom) {
                Some(entry) => entry.amount = entry.amount.saturating_add(coin.amount),
                None => result.push(coin.clone()),
            }
        }
        Self::new(result)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, coin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{coin}")?;
        }
        Ok(())
    }
}

impl FromStr for Coins {
    type Err = CoinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let coins = s
            .split(',')
            .map(Coin::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if coins.len() > MAX_COINS {
            return Err(CoinsError::TooMany(coins.len()));
        }
        let coins = Self::new(coins);
        if let Some(pair) = coins.0.windows(2).find(|pair| pair[0].denom == pair[1].denom) {
            return Err(CoinsError::DuplicateDenom(pair[0].denom.clone()));
        }
        Ok(coins)
    }
}

impl TryFrom<String> for Coins {
    type Error = CoinsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coins> for String {
    fn from(value: Coins) -> Self {
        value.to_string()
    }
}

impl Write for Coins {
    fn write(&self, writer: &mut impl BufMut) {
        self.0.write(writer);
    }
}

impl Read for Coins {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        // Kept verbatim so validation can see malformed fee sets.
        Ok(Self(Vec::<Coin>::read_range(reader, 0..=MAX_COINS)?))
    }
}

impl EncodeSize for Coins {
    fn encode_size(&self) -> usize {
        self.0.encode_size()
    }
}
