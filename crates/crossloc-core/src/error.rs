use crate::escrow_state::EscrowState;
use crate::swap_state::SwapState;

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid swap state transition from {from} to {to}")]
    InvalidStateTransition { from: SwapState, to: SwapState },

    #[error("invalid escrow state transition from {from} to {to}")]
    InvalidEscrowTransition { from: EscrowState, to: EscrowState },

    #[error("invalid order parameters: {0}")]
    InvalidOrderParams(String),

    #[error("invalid address for {family}: {address}")]
    InvalidAddress { family: String, address: String },

    #[error("invalid timelocks: {0}")]
    InvalidTimelocks(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}
