//! Turnstile execution layer.
//!
//! This crate contains the transaction admission pipeline ([ante::AnteHandler]) and the two
//! drivers that run it: [Checker] for mempool admission and [Layer] for block execution.
//!
//! ## Determinism requirements
//! - Do not use wall-clock time or randomness inside the pipeline.
//! - Gas scaling is integer fixed point; do not introduce floats.
//! - Avoid iteration order of hash-based collections influencing outputs.
//!
//! ## Gas exhaustion
//! Running out of gas unwinds with [gas::OutOfGas]. Only [ante::AnteHandler::handle] recovers
//! it; every other panic reaches the caller unchanged.
//!
//! ## Minimal execution pipeline (example)
//! ```rust,ignore
//! use turnstile_execution::{
//!     state_transition::execute_state_transition, AnteHandler, AnteParams, Memory,
//! };
//!
//! # async fn example(transactions: Vec<turnstile_types::Transaction>) -> anyhow::Result<()> {
//! let handler = AnteHandler::new(AnteParams::default())?;
//! let mut state = Memory::default();
//! // The first block of an empty store is height 0.
//! let result = execute_state_transition(&mut state, &handler, "turnstile", 0, transactions)
//!     .await?;
//! assert_eq!(result.height, 0);
//! # Ok(())
//! # }
//! ```

pub mod ante;
pub mod context;
pub mod error;
pub mod gas;
pub mod keeper;
pub mod state_transition;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod admission;
mod layer;
mod state;

pub use admission::Checker;
pub use ante::{AnteHandler, AnteParams};
pub use context::{Context, Mode};
pub use error::{AnteError, ErrorKind, Outcome};
pub use gas::{GasConfig, GasMeter};
pub use keeper::{AccountKeeper, AccountReader, FeeCollector, FeePool, WorkingSet};
pub use layer::Layer;
pub use state::{collected_fees, committed_height, load_account, sequence, Memory, State, Status};
