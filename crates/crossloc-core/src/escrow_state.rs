use std::fmt;

use crate::error::CoreError;

/// On-chain state of one escrow leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EscrowState {
    /// No escrow with this id exists on the chain yet.
    Uncommitted,
    /// Funds are held by the escrow.
    Locked,
    /// Funds were released to the beneficiary. Final state.
    Claimed,
    /// Funds were refunded to the depositor. Final state.
    Cancelled,
}

impl EscrowState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Claimed | Self::Cancelled)
    }

    /// Move to `next`, rejecting anything but `Uncommitted → Locked → {Claimed | Cancelled}`.
    pub fn advance(self, next: EscrowState) -> Result<EscrowState, CoreError> {
        match (self, next) {
            (Self::Uncommitted, Self::Locked)
            | (Self::Locked, Self::Claimed)
            | (Self::Locked, Self::Cancelled) => Ok(next),
            _ => Err(CoreError::InvalidEscrowTransition {
                from: self,
                to: next,
            }),
        }
    }

    /// Reconcile a locally tracked state with what the chain reports.
    ///
    /// Chain state always wins, but it must be reachable from the local state;
    /// a chain reporting an earlier state than we have observed is an error.
    pub fn reconcile(self, observed: EscrowState) -> Result<EscrowState, CoreError> {
        if self == observed {
            return Ok(self);
        }
        match (self, observed) {
            (Self::Uncommitted, _) => Ok(observed),
            (Self::Locked, Self::Claimed) | (Self::Locked, Self::Cancelled) => Ok(observed),
            _ => Err(CoreError::InvalidEscrowTransition {
                from: self,
                to: observed,
            }),
        }
    }
}

impl fmt::Display for EscrowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncommitted => write!(f, "Uncommitted"),
            Self::Locked => write!(f, "Locked"),
            Self::Claimed => write!(f, "Claimed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}
