use crossloc_core::{CoreError, EscrowState};

use crate::types::{RejectReason, TxKind};

/// Escrow-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    #[error("lock rejected: {0}")]
    LockRejected(RejectReason),

    #[error("claim rejected: {0}")]
    ClaimRejected(RejectReason),

    #[error("cancel rejected: {0}")]
    CancelRejected(RejectReason),

    #[error("lock not confirmed after {attempts} attempt(s)")]
    LockTimeout { attempts: u32 },

    #[error("claim not confirmed after {attempts} attempt(s)")]
    ClaimTimeout { attempts: u32 },

    #[error("cancel not confirmed after {attempts} attempt(s)")]
    CancelTimeout { attempts: u32 },

    /// A single confirmation wait elapsed. Says nothing about whether the tx executed.
    #[error("confirmation timed out for {0} transaction")]
    ConfirmationTimeout(TxKind),

    #[error("insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("approval failed: {0}")]
    ApprovalFailed(String),

    #[error("escrow already settled ({0})")]
    AlreadySettled(EscrowState),

    #[error("escrow not locked ({0})")]
    NotLocked(EscrowState),

    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EscrowError {
    /// Errors worth retrying after re-reading chain state.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConfirmationTimeout(_)
            | Self::LockTimeout { .. }
            | Self::ClaimTimeout { .. }
            | Self::CancelTimeout { .. }
            | Self::Ledger(_) => true,
            Self::ClaimRejected(reason) | Self::CancelRejected(reason) => reason.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn rejected(kind: TxKind, reason: RejectReason) -> Self {
        match kind {
            TxKind::Lock => Self::LockRejected(reason),
            TxKind::Claim => Self::ClaimRejected(reason),
            TxKind::Cancel => Self::CancelRejected(reason),
        }
    }

    pub(crate) fn timed_out(kind: TxKind, attempts: u32) -> Self {
        match kind {
            TxKind::Lock => Self::LockTimeout { attempts },
            TxKind::Claim => Self::ClaimTimeout { attempts },
            TxKind::Cancel => Self::CancelTimeout { attempts },
        }
    }
}
