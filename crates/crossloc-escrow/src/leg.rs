//! Per-leg escrow coordination.
//!
//! One [`EscrowLegCoordinator`] drives one escrow through
//! `Uncommitted -> Locked -> {Claimed | Cancelled}`. It never trusts its own
//! memory over the chain: after a lost confirmation it re-reads the escrow
//! before deciding whether to resubmit.

use crossloc_core::{Address, EscrowState, Leg, SwapConfig, SwapOrder, TimeLockWindow, Timestamp};
use crossloc_crypto::Secret;
use std::sync::Arc;
use std::time::Duration;

use crate::error::EscrowError;
use crate::traits::LedgerClient;
use crate::types::{
    CancelReceipt, ClaimReceipt, EscrowRef, EscrowTx, LockRequest, TxHandle, TxStatus,
};

/// Drives one leg's escrow on its chain.
pub struct EscrowLegCoordinator {
    ledger: Arc<dyn LedgerClient>,
    escrow: EscrowRef,
    state: EscrowState,
    window: Option<TimeLockWindow>,
    confirmation_timeout: Duration,
    max_attempts: u32,
}

impl EscrowLegCoordinator {
    /// Coordinator for a leg that has not been locked yet.
    pub fn new(ledger: Arc<dyn LedgerClient>, escrow: EscrowRef, config: &SwapConfig) -> Self {
        Self {
            ledger,
            escrow,
            state: EscrowState::Uncommitted,
            window: None,
            confirmation_timeout: config.confirmation_timeout(),
            max_attempts: config.max_submit_attempts.max(1),
        }
    }

    /// Rebuild a coordinator from persisted state. Call [`refresh`](Self::refresh)
    /// before acting on it.
    pub fn resume(
        ledger: Arc<dyn LedgerClient>,
        escrow: EscrowRef,
        window: Option<TimeLockWindow>,
        state: EscrowState,
        config: &SwapConfig,
    ) -> Self {
        Self {
            window,
            state,
            ..Self::new(ledger, escrow, config)
        }
    }

    pub fn leg(&self) -> Leg {
        self.escrow.leg
    }

    pub fn escrow_ref(&self) -> &EscrowRef {
        &self.escrow
    }

    pub fn state(&self) -> EscrowState {
        self.state
    }

    pub fn window(&self) -> Option<&TimeLockWindow> {
        self.window.as_ref()
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Re-read the escrow from the chain and adopt it as the local state.
    pub async fn refresh(&mut self) -> Result<EscrowState, EscrowError> {
        let observed = self.ledger.query_escrow_state(&self.escrow).await?;
        let reconciled = self.state.reconcile(observed)?;
        if reconciled != self.state {
            tracing::info!(
                escrow = %self.escrow,
                from = %self.state,
                to = %reconciled,
                "escrow state observed on chain"
            );
        }
        self.state = reconciled;
        Ok(reconciled)
    }

    /// Lock this leg's funds. Returns once the lock is confirmed or observed on chain.
    pub async fn lock(
        &mut self,
        order: &SwapOrder,
        window: TimeLockWindow,
        depositor: &Address,
    ) -> Result<EscrowRef, EscrowError> {
        if order.id != self.escrow.escrow_id {
            return Err(EscrowError::Ledger(format!(
                "order {} does not belong to escrow {}",
                order.id, self.escrow
            )));
        }
        self.window = Some(window);

        match self.refresh().await? {
            EscrowState::Uncommitted => {}
            EscrowState::Locked => {
                tracing::info!(escrow = %self.escrow, "escrow already locked");
                return Ok(self.escrow.clone());
            }
            settled => return Err(EscrowError::AlreadySettled(settled)),
        }

        let request = LockRequest::for_leg(order, self.escrow.leg, window, depositor);
        let (tx, _) = self
            .submit_until(EscrowTx::Lock(request), EscrowState::Locked)
            .await?;

        tracing::info!(
            escrow = %self.escrow,
            tx = tx.as_ref().map(|t| t.tx_hash.as_str()).unwrap_or("observed"),
            amount = order.amount(self.escrow.leg),
            "escrow locked"
        );
        Ok(self.escrow.clone())
    }

    /// Claim this leg by revealing `secret`.
    ///
    /// A leg already claimed or cancelled is reported as
    /// [`EscrowError::AlreadySettled`] and nothing is submitted.
    pub async fn claim(
        &mut self,
        secret: &Secret,
        caller: &Address,
    ) -> Result<ClaimReceipt, EscrowError> {
        self.ensure_locked().await?;

        let tx = EscrowTx::Claim {
            escrow_id: self.escrow.escrow_id,
            secret: secret.expose().to_vec(),
            caller: caller.clone(),
        };
        let (handle, confirmed_at) = self.submit_until(tx, EscrowState::Claimed).await?;

        tracing::info!(escrow = %self.escrow, %caller, at = %confirmed_at, "escrow claimed");
        Ok(ClaimReceipt {
            escrow: self.escrow.clone(),
            tx: handle,
            confirmed_at,
        })
    }

    /// Refund this leg to its depositor.
    pub async fn cancel(&mut self, caller: &Address) -> Result<CancelReceipt, EscrowError> {
        self.ensure_locked().await?;

        let tx = EscrowTx::Cancel {
            escrow_id: self.escrow.escrow_id,
            caller: caller.clone(),
        };
        let (handle, confirmed_at) = self.submit_until(tx, EscrowState::Cancelled).await?;

        tracing::info!(escrow = %self.escrow, %caller, at = %confirmed_at, "escrow cancelled");
        Ok(CancelReceipt {
            escrow: self.escrow.clone(),
            tx: handle,
            confirmed_at,
        })
    }

    async fn ensure_locked(&mut self) -> Result<(), EscrowError> {
        if self.state.is_final() {
            return Err(EscrowError::AlreadySettled(self.state));
        }
        match self.refresh().await? {
            EscrowState::Locked => Ok(()),
            EscrowState::Uncommitted => Err(EscrowError::NotLocked(EscrowState::Uncommitted)),
            settled => Err(EscrowError::AlreadySettled(settled)),
        }
    }

    /// Submit `tx` until the escrow reaches `target`.
    ///
    /// A missing confirmation is never taken as proof of non-execution: the
    /// escrow is re-read and the tx is resubmitted only if it still has not
    /// taken effect.
    async fn submit_until(
        &mut self,
        tx: EscrowTx,
        target: EscrowState,
    ) -> Result<(Option<TxHandle>, Timestamp), EscrowError> {
        let kind = tx.kind();

        for attempt in 1..=self.max_attempts {
            let handle = self.ledger.submit(tx.clone()).await?;
            tracing::debug!(escrow = %self.escrow, %kind, attempt, tx = %handle.tx_hash, "submitted");

            match self
                .ledger
                .await_confirmation(&handle, self.confirmation_timeout)
                .await
            {
                Ok(receipt) => match receipt.status {
                    TxStatus::Success => {
                        self.state = self.state.advance(target)?;
                        return Ok((Some(handle), receipt.block_time));
                    }
                    TxStatus::Reverted(reason) => {
                        tracing::warn!(escrow = %self.escrow, %kind, %reason, "transaction reverted");
                        // A revert can race with our own earlier, unconfirmed attempt.
                        if self.refresh().await? == target {
                            let now = self.ledger.current_time().await?;
                            return Ok((None, now));
                        }
                        return Err(EscrowError::rejected(kind, reason));
                    }
                },
                Err(EscrowError::ConfirmationTimeout(_)) => {
                    tracing::warn!(
                        escrow = %self.escrow,
                        %kind,
                        attempt,
                        max_attempts = self.max_attempts,
                        "confirmation timed out, re-reading escrow"
                    );
                    let observed = self.refresh().await?;
                    if observed == target {
                        let now = self.ledger.current_time().await?;
                        return Ok((None, now));
                    }
                    if observed.is_final() {
                        return Err(EscrowError::AlreadySettled(observed));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(EscrowError::timed_out(kind, self.max_attempts))
    }
}
