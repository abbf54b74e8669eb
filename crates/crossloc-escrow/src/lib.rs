//! CrossLoc escrow layer
//!
//! Interfaces to the chains a swap touches ([`LedgerClient`], [`TokenGateway`]),
//! the per-leg coordinator that drives one escrow through lock, claim and
//! cancel, and an in-memory simulated ledger.

pub mod adapters;
pub mod error;
pub mod leg;
pub mod traits;
pub mod types;

pub use adapters::SimulatedLedger;
pub use error::EscrowError;
pub use leg::EscrowLegCoordinator;
pub use traits::{LedgerClient, TokenGateway};
pub use types::{
    CancelReceipt, ClaimReceipt, EscrowRef, EscrowTx, LockRequest, Receipt, RejectReason,
    TxHandle, TxKind, TxStatus,
};
