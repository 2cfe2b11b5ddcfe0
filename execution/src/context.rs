use crate::gas::{GasMeter, InfiniteGasMeter};
use turnstile_types::{execution::Account, Coins};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Mempool admission.
    Check,
    /// Block execution.
    Deliver,
}

/// Per-invocation execution context. Handlers take it by value and hand back the updated one.
pub struct Context {
    chain_id: String,
    height: u64,
    mode: Mode,
    minimum_fees: Coins,
    gas_meter: Box<dyn GasMeter>,
    signers: Vec<Account>,
}

impl Context {
    pub fn new(chain_id: impl Into<String>, height: u64, mode: Mode) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            mode,
            minimum_fees: Coins::empty(),
            gas_meter: Box::new(InfiniteGasMeter::new()),
            signers: Vec::new(),
        }
    }

    pub fn with_minimum_fees(mut self, minimum_fees: Coins) -> Self {
        self.minimum_fees = minimum_fees;
        self
    }

    pub fn with_gas_meter(mut self, gas_meter: Box<dyn GasMeter>) -> Self {
        self.gas_meter = gas_meter;
        self
    }

    pub fn with_signers(mut self, signers: Vec<Account>) -> Self {
        self.signers = signers;
        self
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn is_check_tx(&self) -> bool {
        self.mode == Mode::Check
    }

    pub fn minimum_fees(&self) -> &Coins {
        &self.minimum_fees
    }

    pub fn gas_meter(&self) -> &dyn GasMeter {
        self.gas_meter.as_ref()
    }

    pub fn gas_meter_mut(&mut self) -> &mut dyn GasMeter {
        self.gas_meter.as_mut()
    }

    /// Signer accounts resolved by the last successful ante run.
    pub fn signers(&self) -> &[Account] {
        &self.signers
    }
}
