use std::fmt;

use crate::error::CoreError;

/// States of a swap as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwapState {
    /// Order built and hash-locks derived; the secret is held by the maker side only.
    Created,
    /// The source escrow is locked and confirmed.
    SrcLocked,
    /// The destination escrow is locked and confirmed.
    DstLocked,
    /// The destination claim is confirmed, so the secret is public.
    SecretRevealed,
    /// The resolver claimed the source escrow. Final state.
    SrcClaimed,
    /// Forward progress stopped; waiting for legs to become refundable.
    Cancelling,
    /// Every locked leg was refunded, or nothing was ever locked. Final state.
    Cancelled,
}

impl SwapState {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::SrcClaimed | Self::Cancelled)
    }

    /// Whether an operator abort may still stop this swap.
    pub fn is_abortable(&self) -> bool {
        matches!(self, Self::Created | Self::SrcLocked | Self::DstLocked)
    }
}

impl fmt::Display for SwapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::SrcLocked => write!(f, "SrcLocked"),
            Self::DstLocked => write!(f, "DstLocked"),
            Self::SecretRevealed => write!(f, "SecretRevealed"),
            Self::SrcClaimed => write!(f, "SrcClaimed"),
            Self::Cancelling => write!(f, "Cancelling"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Events that trigger swap state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapEvent {
    /// The source lock transaction was confirmed.
    SrcLockConfirmed,
    /// The destination lock transaction was confirmed.
    DstLockConfirmed,
    /// A claim on the destination escrow was confirmed or observed.
    DstClaimConfirmed,
    /// The source claim transaction was confirmed or observed.
    SrcClaimConfirmed,
    /// Forward progress stopped with at least one leg possibly locked.
    BeginCancel,
    /// The swap failed before anything was locked.
    FailedBeforeLock,
    /// All locked legs have been refunded.
    LegsRefunded,
}

/// Manages swap state transitions.
///
/// Valid transitions:
/// - Created → SrcLocked (SrcLockConfirmed)
/// - Created → Cancelled (FailedBeforeLock)
/// - Created → Cancelling (BeginCancel)
/// - SrcLocked → DstLocked (DstLockConfirmed)
/// - SrcLocked → Cancelling (BeginCancel)
/// - DstLocked → SecretRevealed (DstClaimConfirmed)
/// - DstLocked → Cancelling (BeginCancel)
/// - SecretRevealed → SrcClaimed (SrcClaimConfirmed)
/// - SecretRevealed → Cancelling (BeginCancel)
/// - Cancelling → SecretRevealed (DstClaimConfirmed)
/// - Cancelling → SrcClaimed (SrcClaimConfirmed)
/// - Cancelling → Cancelled (LegsRefunded)
pub struct SwapStateMachine;

impl SwapStateMachine {
    /// Attempt a state transition based on an event.
    /// Returns the new state on success, or an error for invalid transitions.
    pub fn transition(current: SwapState, event: SwapEvent) -> Result<SwapState, CoreError> {
        let new_state = match (current, event) {
            (SwapState::Created, SwapEvent::SrcLockConfirmed) => SwapState::SrcLocked,
            (SwapState::Created, SwapEvent::FailedBeforeLock) => SwapState::Cancelled,
            // A source lock whose confirmation was lost may still land.
            (SwapState::Created, SwapEvent::BeginCancel) => SwapState::Cancelling,

            (SwapState::SrcLocked, SwapEvent::DstLockConfirmed) => SwapState::DstLocked,
            (SwapState::SrcLocked, SwapEvent::BeginCancel) => SwapState::Cancelling,

            (SwapState::DstLocked, SwapEvent::DstClaimConfirmed) => SwapState::SecretRevealed,
            (SwapState::DstLocked, SwapEvent::BeginCancel) => SwapState::Cancelling,

            (SwapState::SecretRevealed, SwapEvent::SrcClaimConfirmed) => SwapState::SrcClaimed,
            (SwapState::SecretRevealed, SwapEvent::BeginCancel) => SwapState::Cancelling,

            // The maker may claim dst while we are already cancelling; the
            // resolver must then go back to claiming src.
            (SwapState::Cancelling, SwapEvent::DstClaimConfirmed) => SwapState::SecretRevealed,
            (SwapState::Cancelling, SwapEvent::SrcClaimConfirmed) => SwapState::SrcClaimed,
            (SwapState::Cancelling, SwapEvent::LegsRefunded) => SwapState::Cancelled,

            _ => {
                let target = match event {
                    SwapEvent::SrcLockConfirmed => SwapState::SrcLocked,
                    SwapEvent::DstLockConfirmed => SwapState::DstLocked,
                    SwapEvent::DstClaimConfirmed => SwapState::SecretRevealed,
                    SwapEvent::SrcClaimConfirmed => SwapState::SrcClaimed,
                    SwapEvent::BeginCancel => SwapState::Cancelling,
                    SwapEvent::FailedBeforeLock | SwapEvent::LegsRefunded => SwapState::Cancelled,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "swap state transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: SwapState, event: SwapEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
