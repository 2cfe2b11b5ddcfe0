use crate::keeper::AccountReader;
use anyhow::Result;
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use std::{collections::HashMap, future::Future};
use turnstile_types::{
    execution::{Account, Key, Value},
    Address, Coins,
};

pub trait State {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<Value>>>;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = Result<()>>;
    fn delete(&mut self, key: &Key) -> impl Future<Output = Result<()>>;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> impl Future<Output = Result<()>> {
        async {
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await?,
                    Status::Delete => self.delete(&key).await?,
                }
            }
            Ok(())
        }
    }
}

/// In-process store.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

impl Memory {
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.state.get(key).cloned())
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.state.insert(key, value);
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.state.remove(key);
        Ok(())
    }
}

impl AccountReader for Memory {
    fn read_account(&self, address: &Address) -> Result<Option<Account>> {
        Ok(match self.state.get(&Key::Account(*address)) {
            Some(Value::Account(account)) => Some(account.clone()),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Status {
    Update(Value),
    Delete,
}

impl Write for Status {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Status::Update(value) => {
                0u8.write(writer);
                value.write(writer);
            }
            Status::Delete => 1u8.write(writer),
        }
    }
}

impl Read for Status {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Status::Update(Value::read(reader)?)),
            1 => Ok(Status::Delete),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Status {
    fn encode_size(&self) -> usize {
        1 + match self {
            Status::Update(value) => value.encode_size(),
            Status::Delete => 0,
        }
    }
}

pub async fn load_account<S: State>(state: &S, address: &Address) -> Result<Option<Account>> {
    Ok(match state.get(&Key::Account(*address)).await? {
        Some(Value::Account(account)) => Some(account),
        _ => None,
    })
}

/// Next expected sequence for `address` (0 for unknown accounts).
pub async fn sequence<S: State>(state: &S, address: &Address) -> Result<u64> {
    Ok(load_account(state, address)
        .await?
        .map_or(0, |account| account.sequence))
}

pub async fn collected_fees<S: State>(state: &S) -> Result<Coins> {
    Ok(match state.get(&Key::CollectedFees).await? {
        Some(Value::CollectedFees(coins)) => coins,
        _ => Coins::empty(),
    })
}

/// Last committed height, if any block has been committed.
pub async fn committed_height<S: State>(state: &S) -> Result<Option<u64>> {
    Ok(match state.get(&Key::Commit).await? {
        Some(Value::Commit { height }) => Some(height),
        _ => None,
    })
}
