//! Apply a block's transactions to state.
//!
//! Re-running a height that is already committed is a no-op, so a driver that crashes between
//! executing and acknowledging a block can safely replay it.

use crate::{
    ante::AnteHandler,
    error::Outcome,
    state::{committed_height, State, Status},
    Layer,
};
use anyhow::{anyhow, Context as _};
use std::collections::BTreeMap;
use tracing::{debug, info};
use turnstile_types::{
    execution::{Key, Transaction, Value},
    Address,
};

/// Result of executing a block's state transition
#[derive(Debug)]
pub struct StateTransitionResult {
    pub height: u64,
    /// One outcome per transaction, in block order (empty if the height was already committed).
    pub outcomes: Vec<Outcome>,
    /// Map of signer addresses to their next expected sequence after processing
    pub processed_sequences: BTreeMap<Address, u64>,
}

impl StateTransitionResult {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_ok()).count()
    }
}

/// Execute state transition for a block
///
/// Only processes the block if it is the next expected height: heights at or below the last
/// committed height are skipped, and gaps are rejected rather than silently skipped. The first
/// block of an empty store is height 0.
pub async fn execute_state_transition<S: State>(
    state: &mut S,
    handler: &AnteHandler,
    chain_id: &str,
    height: u64,
    transactions: Vec<Transaction>,
) -> anyhow::Result<StateTransitionResult> {
    let state_height = committed_height(state)
        .await
        .context("read committed height")?;

    if let Some(committed) = state_height {
        if height <= committed {
            debug!(height, committed, "skipping committed height");
            return Ok(StateTransitionResult {
                height,
                outcomes: Vec::new(),
                processed_sequences: BTreeMap::new(),
            });
        }
    }

    let expected_next_height = state_height.map_or(0, |h| h.saturating_add(1));
    if height != expected_next_height {
        return Err(anyhow!(
            "non-sequential height: state_height={state_height:?}, expected={expected_next_height}, requested={height}"
        ));
    }

    let mut layer = Layer::new(&*state, handler, chain_id, height);
    let (outcomes, processed_sequences) = layer
        .execute(transactions)
        .await
        .with_context(|| format!("execute layer (height={height})"))?;
    let mut changes = layer.commit();
    changes.push((Key::Commit, Status::Update(Value::Commit { height })));

    state
        .apply(changes)
        .await
        .with_context(|| format!("apply state changes (height={height})"))?;

    let result = StateTransitionResult {
        height,
        outcomes,
        processed_sequences,
    };
    info!(
        height,
        transactions = result.outcomes.len(),
        accepted = result.accepted(),
        "committed block"
    );
    Ok(result)
}
