//! Gas metering.
//!
//! Exceeding a bounded meter's limit does not return an error: the meter unwinds with an
//! [OutOfGas] payload, which only the ante handler recovers. Overflowing the raw counter
//! unwinds with [GasOverflow], which nobody recovers.

use std::{
    panic::{self, panic_any},
    sync::Once,
};
use thiserror::Error;

pub type Gas = u64;

/// Q32 fixed-point scale used by [LogCurve::scale].
const FRACTION_BITS: u32 = 32;

/// Unwind payload raised when a bounded meter passes its limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutOfGas {
    pub descriptor: String,
    pub limit: Gas,
}

/// Unwind payload raised when the raw counter would wrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GasOverflow {
    pub descriptor: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("gas base must be greater than 1.000 (got {0} permille)")]
    InvalidBase(u64),
}

/// Logarithmic scaling applied to raw consumption.
///
/// Consumption up to `shift` is reported as-is. Above it the reported value is the largest `k`
/// with `base^k <= raw`, computed in integer fixed point so every platform agrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogCurve {
    base_permille: u64,
    shift: Gas,
}

impl LogCurve {
    pub fn new(base_permille: u64, shift: Gas) -> Result<Self, ParamsError> {
        if base_permille <= 1000 {
            return Err(ParamsError::InvalidBase(base_permille));
        }
        Ok(Self {
            base_permille,
            shift,
        })
    }

    pub fn shift(&self) -> Gas {
        self.shift
    }

    pub fn scale(&self, raw: Gas) -> Gas {
        if raw <= self.shift {
            return raw;
        }
        let target = (raw as u128) << FRACTION_BITS;
        let mut power: u128 = 1 << FRACTION_BITS;
        let mut k = 0;
        loop {
            let next = power * self.base_permille as u128 / 1000;
            if next > target {
                return k;
            }
            power = next;
            k += 1;
        }
    }
}

/// Constants of the cost model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasConfig {
    pub ed25519_verify_cost: Gas,
    pub secp256k1_verify_cost: Gas,
    /// Logarithm base in thousandths (1020 is 1.02).
    pub base_permille: u64,
    pub shift: Gas,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            ed25519_verify_cost: 59,
            secp256k1_verify_cost: 100,
            base_permille: 1020,
            shift: 285,
        }
    }
}

impl GasConfig {
    pub fn curve(&self) -> Result<LogCurve, ParamsError> {
        LogCurve::new(self.base_permille, self.shift)
    }
}

pub trait GasMeter: Send {
    /// Consumption as reported to callers (scaled for bounded meters).
    fn gas_consumed(&self) -> Gas;

    /// Declared limit. Unbounded meters report [Gas::MAX].
    fn limit(&self) -> Gas;

    /// Charge `amount`. Unwinds with [OutOfGas] if a bounded meter passes its limit.
    fn consume_gas(&mut self, amount: Gas, descriptor: &str);

    fn is_past_limit(&self) -> bool;

    fn is_infinite(&self) -> bool {
        false
    }
}

fn add_raw(consumed: Gas, amount: Gas, descriptor: &str) -> Gas {
    match consumed.checked_add(amount) {
        Some(total) => total,
        None => panic_any(GasOverflow {
            descriptor: descriptor.to_string(),
        }),
    }
}

/// Meter bounded by a declared limit with logarithmic scaling.
#[derive(Clone, Debug)]
pub struct BasicGasMeter {
    limit: Gas,
    consumed: Gas,
    curve: LogCurve,
}

impl BasicGasMeter {
    pub fn new(limit: Gas, curve: LogCurve) -> Self {
        Self {
            limit,
            consumed: 0,
            curve,
        }
    }

    /// Unscaled running total.
    pub fn raw_consumed(&self) -> Gas {
        self.consumed
    }
}

impl GasMeter for BasicGasMeter {
    fn gas_consumed(&self) -> Gas {
        self.curve.scale(self.consumed)
    }

    fn limit(&self) -> Gas {
        self.limit
    }

    fn consume_gas(&mut self, amount: Gas, descriptor: &str) {
        self.consumed = add_raw(self.consumed, amount, descriptor);
        if self.is_past_limit() {
            panic_any(OutOfGas {
                descriptor: descriptor.to_string(),
                limit: self.limit,
            });
        }
    }

    fn is_past_limit(&self) -> bool {
        self.gas_consumed() > self.limit
    }
}

/// Meter used when simulating and at genesis. Tracks consumption but never aborts on a limit.
#[derive(Clone, Debug, Default)]
pub struct InfiniteGasMeter {
    consumed: Gas,
}

impl InfiniteGasMeter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GasMeter for InfiniteGasMeter {
    fn gas_consumed(&self) -> Gas {
        self.consumed
    }

    fn limit(&self) -> Gas {
        Gas::MAX
    }

    fn consume_gas(&mut self, amount: Gas, descriptor: &str) {
        self.consumed = add_raw(self.consumed, amount, descriptor);
    }

    fn is_past_limit(&self) -> bool {
        false
    }

    fn is_infinite(&self) -> bool {
        true
    }
}

/// Install a panic hook that stays quiet for [OutOfGas] unwinds and defers to the previous
/// hook for everything else. Safe to call more than once.
pub fn silence_out_of_gas_panics() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().is::<OutOfGas>() {
                return;
            }
            previous(info);
        }));
    });
}
