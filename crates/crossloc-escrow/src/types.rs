use crossloc_core::{
    Address, Amount, ChainId, HashLock, Leg, OrderId, SwapOrder, TimeLockWindow, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a chain refused a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Preimage does not hash to the escrow's hash-lock.
    WrongSecret,
    /// The requested window has not opened yet.
    TooEarly,
    /// The claim window has closed.
    WindowClosed,
    /// The escrow is already claimed or cancelled.
    AlreadySettled,
    /// Caller may not act in the current window.
    NotAuthorized,
    InsufficientBalance,
    InsufficientAllowance,
    /// An escrow with this id already exists.
    DuplicateEscrow,
    UnknownEscrow,
}

impl RejectReason {
    /// Whether the same transaction may succeed later without any change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TooEarly)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongSecret => write!(f, "wrong secret"),
            Self::TooEarly => write!(f, "too early"),
            Self::WindowClosed => write!(f, "window closed"),
            Self::AlreadySettled => write!(f, "already settled"),
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::InsufficientBalance => write!(f, "insufficient balance"),
            Self::InsufficientAllowance => write!(f, "insufficient allowance"),
            Self::DuplicateEscrow => write!(f, "duplicate escrow"),
            Self::UnknownEscrow => write!(f, "unknown escrow"),
        }
    }
}

/// Reference to one leg's escrow on its chain.
///
/// The escrow id is the order id on both chains, so a reference can be rebuilt
/// from the order alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowRef {
    pub chain: ChainId,
    pub leg: Leg,
    pub contract: Address,
    pub escrow_id: OrderId,
}

impl EscrowRef {
    pub fn for_leg(order: &SwapOrder, leg: Leg) -> Self {
        let chain = order.chain(leg);
        Self {
            chain: chain.id,
            leg,
            contract: chain.escrow_contract.clone(),
            escrow_id: order.id,
        }
    }
}

impl fmt::Display for EscrowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.leg, self.chain, self.escrow_id.short())
    }
}

/// Parameters of a lock transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub escrow_id: OrderId,
    /// Order maker's address on this chain.
    pub maker: Address,
    /// Resolver's address on this chain.
    pub taker: Address,
    /// Who funds the escrow and receives refunds.
    pub depositor: Address,
    /// Who receives the funds on a successful claim.
    pub beneficiary: Address,
    pub token: Address,
    pub amount: Amount,
    pub hash_lock: HashLock,
    pub window: TimeLockWindow,
}

impl LockRequest {
    /// Lock parameters for `leg` of `order`.
    ///
    /// The source leg pays the resolver and the destination leg pays the maker.
    pub fn for_leg(
        order: &SwapOrder,
        leg: Leg,
        window: TimeLockWindow,
        depositor: &Address,
    ) -> Self {
        let (maker, taker, beneficiary) = match leg {
            Leg::Source => (&order.maker.src, &order.resolver.src, &order.resolver.src),
            Leg::Destination => (&order.maker.dst, &order.resolver.dst, &order.maker.dst),
        };
        Self {
            escrow_id: order.id,
            maker: maker.clone(),
            taker: taker.clone(),
            depositor: depositor.clone(),
            beneficiary: beneficiary.clone(),
            token: order.token(leg).clone(),
            amount: order.amount(leg),
            hash_lock: order.hash_lock(leg),
            window,
        }
    }
}

/// A transaction against an escrow contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscrowTx {
    Lock(LockRequest),
    /// Claim revealing the preimage in the transaction's public data.
    Claim {
        escrow_id: OrderId,
        secret: Vec<u8>,
        caller: Address,
    },
    Cancel {
        escrow_id: OrderId,
        caller: Address,
    },
}

impl EscrowTx {
    pub fn kind(&self) -> TxKind {
        match self {
            Self::Lock(_) => TxKind::Lock,
            Self::Claim { .. } => TxKind::Claim,
            Self::Cancel { .. } => TxKind::Cancel,
        }
    }

    pub fn escrow_id(&self) -> OrderId {
        match self {
            Self::Lock(req) => req.escrow_id,
            Self::Claim { escrow_id, .. } | Self::Cancel { escrow_id, .. } => *escrow_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Lock,
    Claim,
    Cancel,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => write!(f, "lock"),
            Self::Claim => write!(f, "claim"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// Handle to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle {
    pub chain: ChainId,
    pub kind: TxKind,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Reverted(RejectReason),
}

/// Confirmed outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx: TxHandle,
    pub status: TxStatus,
    /// Chain time of the block that included the transaction.
    pub block_time: Timestamp,
}

/// Proof that a leg was claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub escrow: EscrowRef,
    /// `None` when the claim was observed by re-query rather than by our own receipt.
    pub tx: Option<TxHandle>,
    pub confirmed_at: Timestamp,
}

/// Proof that a leg was refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReceipt {
    pub escrow: EscrowRef,
    pub tx: Option<TxHandle>,
    pub confirmed_at: Timestamp,
}
