use crate::gas::Gas;
use thiserror::Error;
use turnstile_types::TxError;

/// Stable classification of ante failures (codes follow the classic SDK numbering).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Internal,
    InvalidSequence,
    Unauthorized,
    InsufficientFunds,
    UnknownRequest,
    InvalidPubKey,
    UnknownAddress,
    OutOfGas,
    MemoTooLarge,
    InsufficientFee,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::Internal => 1,
            Self::InvalidSequence => 3,
            Self::Unauthorized => 4,
            Self::InsufficientFunds => 5,
            Self::UnknownRequest => 6,
            Self::InvalidPubKey => 8,
            Self::UnknownAddress => 9,
            Self::OutOfGas => 12,
            Self::MemoTooLarge => 13,
            Self::InsufficientFee => 14,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AnteError {
    #[error("internal: {0}")]
    Internal(String),
    #[error("invalid sequence: {0}")]
    InvalidSequence(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("unknown request: {0}")]
    UnknownRequest(String),
    #[error("invalid pubkey: {0}")]
    InvalidPubKey(String),
    #[error("unknown address: {0}")]
    UnknownAddress(String),
    #[error("out of gas: {0}")]
    OutOfGas(String),
    #[error("memo too large: {0}")]
    MemoTooLarge(String),
    #[error("insufficient fee: {0}")]
    InsufficientFee(String),
}

impl AnteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Internal(_) => ErrorKind::Internal,
            Self::InvalidSequence(_) => ErrorKind::InvalidSequence,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Self::UnknownRequest(_) => ErrorKind::UnknownRequest,
            Self::InvalidPubKey(_) => ErrorKind::InvalidPubKey,
            Self::UnknownAddress(_) => ErrorKind::UnknownAddress,
            Self::OutOfGas(_) => ErrorKind::OutOfGas,
            Self::MemoTooLarge(_) => ErrorKind::MemoTooLarge,
            Self::InsufficientFee(_) => ErrorKind::InsufficientFee,
        }
    }

    /// The bare log line, without the kind prefix.
    pub fn log(&self) -> &str {
        match self {
            Self::Internal(log)
            | Self::InvalidSequence(log)
            | Self::Unauthorized(log)
            | Self::InsufficientFunds(log)
            | Self::UnknownRequest(log)
            | Self::InvalidPubKey(log)
            | Self::UnknownAddress(log)
            | Self::OutOfGas(log)
            | Self::MemoTooLarge(log)
            | Self::InsufficientFee(log) => log,
        }
    }
}

impl From<TxError> for AnteError {
    fn from(err: TxError) -> Self {
        let log = err.to_string();
        match err {
            TxError::NoMessages | TxError::InvalidMessage(_) => Self::UnknownRequest(log),
            TxError::InvalidFee(_) => Self::InsufficientFee(log),
            TxError::NoSignatures | TxError::WrongSignerCount { .. } => Self::Unauthorized(log),
            TxError::MemoTooLarge { .. } => Self::MemoTooLarge(log),
        }
    }
}

/// Result of one ante run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub error: Option<AnteError>,
    pub log: String,
    pub gas_wanted: Gas,
    pub gas_used: Gas,
    /// Set on every rejection; nothing the run wrote may be persisted.
    pub abort: bool,
}

impl Outcome {
    pub fn accepted(gas_wanted: Gas, gas_used: Gas) -> Self {
        Self {
            error: None,
            log: String::new(),
            gas_wanted,
            gas_used,
            abort: false,
        }
    }

    pub fn rejected(error: AnteError, gas_wanted: Gas, gas_used: Gas) -> Self {
        Self {
            log: error.log().to_string(),
            error: Some(error),
            gas_wanted,
            gas_used,
            abort: true,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(AnteError::kind)
    }
}
