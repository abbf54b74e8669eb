use crossloc_core::{CoreError, Leg, OrderId};
use crossloc_crypto::CryptoError;
use crossloc_escrow::EscrowError;

/// Swap orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("swap not found: {0}")]
    NotFound(OrderId),

    #[error("swap already exists: {0}")]
    AlreadyExists(OrderId),

    #[error("invalid swap parameters: {0}")]
    InvalidParams(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("swap task ended unexpectedly: {0}")]
    TaskEnded(OrderId),

    #[error("no {0} window recorded")]
    MissingWindow(Leg),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),
}

impl From<serde_json::Error> for SwapError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<std::io::Error> for SwapError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
