use async_trait::async_trait;
use crossloc_core::{Address, Amount, ChainId, EscrowState, Timestamp};
use std::time::Duration;

use crate::error::EscrowError;
use crate::types::{EscrowRef, EscrowTx, Receipt, TxHandle};

/// Capability bound to one chain: submit escrow transactions and read chain state.
///
/// Implementations own the RPC client and signer for that chain.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Latest block time on this chain.
    async fn current_time(&self) -> Result<Timestamp, EscrowError>;

    /// Broadcast a transaction. Returning a handle does not mean it executed.
    async fn submit(&self, tx: EscrowTx) -> Result<TxHandle, EscrowError>;

    /// Wait up to `timeout` for the transaction's receipt.
    ///
    /// Returns [`EscrowError::ConfirmationTimeout`] if no receipt was seen; the
    /// transaction may still have executed.
    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        timeout: Duration,
    ) -> Result<Receipt, EscrowError>;

    /// Authoritative on-chain state of an escrow.
    async fn query_escrow_state(&self, escrow: &EscrowRef) -> Result<EscrowState, EscrowError>;

    /// Preimage published by a confirmed claim on this escrow, if any.
    async fn revealed_secret(&self, escrow: &EscrowRef) -> Result<Option<Vec<u8>>, EscrowError>;
}

/// Token balance and allowance management on one chain.
#[async_trait]
pub trait TokenGateway: Send + Sync {
    /// Make sure `spender` may move `amount` of `token` from `owner`.
    ///
    /// Fails with [`EscrowError::InsufficientBalance`] or [`EscrowError::ApprovalFailed`].
    async fn ensure_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), EscrowError>;
}
