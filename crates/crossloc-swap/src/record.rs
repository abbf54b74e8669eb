use chrono::{DateTime, Utc};
use crossloc_core::{
    CancelReason, EscrowState, HashLock, Leg, OrderId, SwapOrder, SwapState, TimeLockWindow,
    Timestamp,
};
use crossloc_crypto::OrderSignature;
use crossloc_escrow::EscrowRef;
use serde::{Deserialize, Serialize};

/// Swap identifier; the order's commitment hash.
pub type SwapId = OrderId;

/// Who decides when the secret is revealed on the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretCustody {
    /// Reveal as soon as the destination leg is withdrawable.
    #[default]
    Orchestrator,
    /// Wait for the maker to call `release_secret`.
    Maker,
}

/// Persisted state of one swap.
///
/// Never contains the secret. Windows are written before the matching lock is
/// submitted, so a restarted process can find and refund any lock it sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub swap_id: SwapId,
    pub order: SwapOrder,
    pub signature: OrderSignature,
    pub custody: SecretCustody,
    pub state: SwapState,
    pub src_escrow: EscrowRef,
    pub dst_escrow: EscrowRef,
    pub src_window: Option<TimeLockWindow>,
    pub dst_window: Option<TimeLockWindow>,
    pub src_state: EscrowState,
    pub dst_state: EscrowState,
    /// Destination chain time of the claim that published the secret.
    pub secret_revealed_at: Option<Timestamp>,
    pub cancel_reason: Option<CancelReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SwapRecord {
    pub fn new(order: SwapOrder, signature: OrderSignature, custody: SecretCustody) -> Self {
        let now = Utc::now();
        Self {
            swap_id: order.id,
            src_escrow: EscrowRef::for_leg(&order, Leg::Source),
            dst_escrow: EscrowRef::for_leg(&order, Leg::Destination),
            order,
            signature,
            custody,
            state: SwapState::Created,
            src_window: None,
            dst_window: None,
            src_state: EscrowState::Uncommitted,
            dst_state: EscrowState::Uncommitted,
            secret_revealed_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn hash_lock(&self, leg: Leg) -> HashLock {
        self.order.hash_lock(leg)
    }

    pub fn window(&self, leg: Leg) -> Option<&TimeLockWindow> {
        match leg {
            Leg::Source => self.src_window.as_ref(),
            Leg::Destination => self.dst_window.as_ref(),
        }
    }

    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
