//! Per-swap driver task.
//!
//! One [`SwapDriver`] owns one swap: its record, both leg coordinators and,
//! until the destination claim, the secret. It loops one step at a time,
//! re-reading chain time and escrow state on every wake-up, and persists the
//! record on every transition.

use crossloc_core::{
    CancelReason, EscrowState, Leg, Phase, SwapEvent, SwapState, SwapStateMachine,
    TimeLockWindow, TimelockScheduler, Timestamp,
};
use crossloc_crypto::Secret;
use crossloc_escrow::{EscrowError, EscrowLegCoordinator, RejectReason, TokenGateway};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use zeroize::Zeroize;

use crate::error::SwapError;
use crate::record::{SecretCustody, SwapRecord};
use crate::store::SwapStore;

/// Out-of-band requests from the orchestrator to a running driver.
#[derive(Default)]
pub(crate) struct SwapControls {
    abort: AtomicBool,
    release: AtomicBool,
    stop: AtomicBool,
    wake: Notify,
}

impl SwapControls {
    pub(crate) fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub(crate) fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn clear_abort(&self) {
        self.abort.store(false, Ordering::SeqCst);
    }

    pub(crate) fn release_secret(&self) {
        self.release.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn secret_released(&self) -> bool {
        self.release.load(Ordering::SeqCst)
    }

    /// Leave the loop without touching the swap's state.
    pub(crate) fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleep for `poll` or until woken by a request.
    async fn wait(&self, poll: Duration) {
        let _ = tokio::time::timeout(poll, self.wake.notified()).await;
    }
}

/// Outcome of one step: an event to apply, or `None` to wait and re-check.
type Step = Result<Option<SwapEvent>, SwapError>;

pub(crate) struct SwapDriver {
    pub(crate) record: SwapRecord,
    pub(crate) src: EscrowLegCoordinator,
    pub(crate) dst: EscrowLegCoordinator,
    pub(crate) src_gateway: Arc<dyn TokenGateway>,
    pub(crate) dst_gateway: Arc<dyn TokenGateway>,
    pub(crate) store: Arc<dyn SwapStore>,
    /// Dropped (and zeroized) as soon as the destination claim lands.
    pub(crate) secret: Option<Secret>,
    pub(crate) controls: Arc<SwapControls>,
    pub(crate) status: watch::Sender<SwapState>,
    pub(crate) poll: Duration,
    pub(crate) allowances_ready: bool,
}

impl SwapDriver {
    /// Drive the swap until it is final or stopped. Returns the last state.
    pub(crate) async fn run(mut self) -> SwapState {
        tracing::debug!(
            swap = %self.record.swap_id.short(),
            state = %self.record.state,
            has_secret = self.secret.is_some(),
            "swap driver started"
        );

        while !self.record.is_final() {
            if self.controls.stopped() {
                tracing::info!(
                    swap = %self.record.swap_id.short(),
                    state = %self.record.state,
                    "swap driver stopped"
                );
                return self.record.state;
            }

            match self.step().await {
                Ok(Some(event)) => {
                    if let Err(e) = self.apply(event).await {
                        tracing::error!(
                            swap = %self.record.swap_id.short(),
                            event = ?event,
                            error = %e,
                            "failed to record swap transition"
                        );
                        self.controls.wait(self.poll).await;
                    }
                }
                Ok(None) => self.controls.wait(self.poll).await,
                Err(e) => {
                    tracing::warn!(
                        swap = %self.record.swap_id.short(),
                        state = %self.record.state,
                        error = %e,
                        "swap step failed, retrying"
                    );
                    self.controls.wait(self.poll).await;
                }
            }
        }

        self.secret = None;
        self.record.state
    }

    async fn step(&mut self) -> Step {
        match self.record.state {
            SwapState::Created => self.on_created().await,
            SwapState::SrcLocked => self.on_src_locked().await,
            SwapState::DstLocked => self.on_dst_locked().await,
            SwapState::SecretRevealed => self.on_secret_revealed().await,
            SwapState::Cancelling => self.on_cancelling().await,
            SwapState::SrcClaimed | SwapState::Cancelled => Ok(None),
        }
    }

    async fn apply(&mut self, event: SwapEvent) -> Result<(), SwapError> {
        let from = self.record.state;
        let to = SwapStateMachine::transition(from, event)?;
        self.record.state = to;
        // Observers only ever see states that are already durable.
        if let Err(e) = self.persist().await {
            self.record.state = from;
            return Err(e);
        }
        self.status.send_replace(to);

        tracing::info!(
            swap = %self.record.swap_id.short(),
            %from,
            %to,
            reason = ?self.record.cancel_reason,
            "swap advanced"
        );
        Ok(())
    }

    async fn persist(&mut self) -> Result<(), SwapError> {
        self.record.src_state = self.src.state();
        self.record.dst_state = self.dst.state();
        self.record.touch();
        self.store.save(&self.record).await
    }

    async fn on_created(&mut self) -> Step {
        if self.controls.abort_requested() {
            return Ok(self.fail_before_lock(CancelReason::Aborted));
        }

        if !self.allowances_ready {
            if let Err(e) = self.ensure_allowances().await {
                if e.is_transient() {
                    return Err(e.into());
                }
                return Ok(self.fail_before_lock(CancelReason::AllowanceFailed(e.to_string())));
            }
            self.allowances_ready = true;
        }

        let window = self.window_for(Leg::Source).await?;
        let order = &self.record.order;
        match self.src.lock(order, window, &order.maker.src).await {
            Ok(_) => Ok(Some(SwapEvent::SrcLockConfirmed)),
            Err(e) => self.on_lock_error(Leg::Source, e),
        }
    }

    async fn on_src_locked(&mut self) -> Step {
        if self.controls.abort_requested() {
            return Ok(self.begin_cancel(CancelReason::Aborted));
        }

        if self.record.dst_window.is_none() {
            let src_window = self.window(Leg::Source)?;
            let now = self.src.ledger().current_time().await?;
            if TimelockScheduler::phase(&src_window, now).can_cancel() {
                return Ok(self.begin_cancel(CancelReason::SrcWindowElapsed));
            }
            let elapsed = src_window.locked_at.until(now);
            let budget = self.record.order.timelocks.max_dst_lock_delay();
            if elapsed > budget {
                tracing::warn!(
                    swap = %self.record.swap_id.short(),
                    elapsed,
                    budget,
                    "too late to lock destination safely"
                );
                return Ok(self.begin_cancel(CancelReason::InsufficientTimeBudget));
            }
        }

        let window = self.window_for(Leg::Destination).await?;
        let order = &self.record.order;
        match self.dst.lock(order, window, &order.resolver.dst).await {
            Ok(_) => Ok(Some(SwapEvent::DstLockConfirmed)),
            Err(e) => self.on_lock_error(Leg::Destination, e),
        }
    }

    async fn on_dst_locked(&mut self) -> Step {
        if self.dst.refresh().await? == EscrowState::Claimed {
            let now = self.dst.ledger().current_time().await?;
            return Ok(self.dst_claimed(now));
        }
        if self.controls.abort_requested() {
            return Ok(self.begin_cancel(CancelReason::Aborted));
        }

        let window = self.window(Leg::Destination)?;
        let now = self.dst.ledger().current_time().await?;
        let phase = TimelockScheduler::phase(&window, now);
        if phase.can_cancel() || self.dst.state() == EscrowState::Cancelled {
            return Ok(self.begin_cancel(CancelReason::SecretWithheld));
        }
        if !phase.can_claim() {
            return Ok(None);
        }
        if self.record.custody == SecretCustody::Maker && !self.controls.secret_released() {
            return Ok(None);
        }
        let Some(secret) = self.secret.as_ref() else {
            return Ok(self.begin_cancel(CancelReason::SecretUnavailable));
        };

        match self.dst.claim(secret, &self.record.order.maker.dst).await {
            Ok(receipt) => Ok(self.dst_claimed(receipt.confirmed_at)),
            Err(EscrowError::AlreadySettled(EscrowState::Claimed)) => Ok(self.dst_claimed(now)),
            Err(EscrowError::AlreadySettled(_)) => {
                Ok(self.begin_cancel(CancelReason::SecretWithheld))
            }
            Err(e) if e.is_transient() => {
                tracing::debug!(swap = %self.record.swap_id.short(), error = %e, "destination claim deferred");
                Ok(None)
            }
            Err(e) => Ok(self.begin_cancel(CancelReason::ClaimRejected(e.to_string()))),
        }
    }

    async fn on_secret_revealed(&mut self) -> Step {
        if self.controls.abort_requested() {
            tracing::warn!(
                swap = %self.record.swap_id.short(),
                "abort ignored, secret is public and the source must be claimed"
            );
            self.controls.clear_abort();
        }

        if self.src.refresh().await? == EscrowState::Claimed {
            return Ok(Some(SwapEvent::SrcClaimConfirmed));
        }

        let Some(mut revealed) = self
            .dst
            .ledger()
            .revealed_secret(self.dst.escrow_ref())
            .await?
        else {
            tracing::debug!(swap = %self.record.swap_id.short(), "revealed secret not visible yet");
            return Ok(None);
        };
        let parsed = Secret::from_revealed(&revealed);
        revealed.zeroize();
        let order = &self.record.order;
        let secret = match parsed {
            Ok(secret) if secret.opens(&order.src_chain.hash, &order.src_hash_lock) => secret,
            _ => {
                tracing::error!(
                    swap = %self.record.swap_id.short(),
                    "revealed secret does not open the source hash-lock"
                );
                return Ok(self.begin_cancel(CancelReason::ClaimRejected(
                    "revealed secret does not open the source hash-lock".into(),
                )));
            }
        };

        let window = self.window(Leg::Source)?;
        let now = self.src.ledger().current_time().await?;
        let phase = TimelockScheduler::phase(&window, now);
        if phase == Phase::BeforeWithdrawal {
            return Ok(None);
        }
        if phase.can_cancel() {
            tracing::error!(
                swap = %self.record.swap_id.short(),
                %phase,
                "source claim window missed after the secret was revealed"
            );
            return Ok(self.begin_cancel(CancelReason::ClaimWindowMissed));
        }

        match self.src.claim(&secret, &self.record.order.resolver.src).await {
            Ok(_) | Err(EscrowError::AlreadySettled(EscrowState::Claimed)) => {
                Ok(Some(SwapEvent::SrcClaimConfirmed))
            }
            Err(EscrowError::ClaimRejected(RejectReason::WindowClosed))
            | Err(EscrowError::AlreadySettled(_)) => {
                tracing::error!(
                    swap = %self.record.swap_id.short(),
                    "source escrow can no longer be claimed"
                );
                Ok(self.begin_cancel(CancelReason::ClaimWindowMissed))
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(swap = %self.record.swap_id.short(), error = %e, "source claim deferred");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(swap = %self.record.swap_id.short(), error = %e, "source claim rejected");
                Ok(self.begin_cancel(CancelReason::ClaimRejected(e.to_string())))
            }
        }
    }

    async fn on_cancelling(&mut self) -> Step {
        self.controls.clear_abort();

        let src_state = self.src.refresh().await?;
        if src_state == EscrowState::Claimed {
            return Ok(Some(SwapEvent::SrcClaimConfirmed));
        }
        let dst_state = self.dst.refresh().await?;

        let src_now = self.src.ledger().current_time().await?;
        let dst_now = self.dst.ledger().current_time().await?;
        let src_phase = self
            .record
            .src_window
            .as_ref()
            .map(|w| TimelockScheduler::phase(w, src_now));
        let src_cancellable = src_phase.is_some_and(|p| p.can_cancel());

        // The maker revealed after all; the resolver still has to claim src.
        if dst_state == EscrowState::Claimed
            && src_state == EscrowState::Locked
            && self.record.secret_revealed_at.is_none()
            && !src_cancellable
        {
            tracing::info!(
                swap = %self.record.swap_id.short(),
                "destination claimed while cancelling"
            );
            return Ok(self.dst_claimed(dst_now));
        }

        if dst_state == EscrowState::Locked {
            let dst_cancellable = self
                .record
                .dst_window
                .as_ref()
                .is_some_and(|w| TimelockScheduler::phase(w, dst_now).can_cancel());
            if dst_cancellable {
                self.try_cancel(Leg::Destination).await;
            }
        }
        if src_state == EscrowState::Locked && src_cancellable {
            self.try_cancel(Leg::Source).await;
        }

        let resolved = leg_resolved(self.src.state(), self.record.src_window.as_ref(), src_now)
            && leg_resolved(self.dst.state(), self.record.dst_window.as_ref(), dst_now);
        Ok(resolved.then_some(SwapEvent::LegsRefunded))
    }

    async fn ensure_allowances(&self) -> Result<(), EscrowError> {
        let order = &self.record.order;
        self.src_gateway
            .ensure_allowance(
                &order.src_token,
                &order.maker.src,
                &order.src_chain.escrow_contract,
                order.making_amount,
            )
            .await?;
        self.dst_gateway
            .ensure_allowance(
                &order.dst_token,
                &order.resolver.dst,
                &order.dst_chain.escrow_contract,
                order.taking_amount,
            )
            .await
    }

    /// The leg's recorded window, or a fresh one on that leg's chain time.
    /// A fresh window is persisted before it is returned.
    async fn window_for(&mut self, leg: Leg) -> Result<TimeLockWindow, SwapError> {
        if let Some(window) = self.record.window(leg) {
            return Ok(*window);
        }
        let coordinator = match leg {
            Leg::Source => &self.src,
            Leg::Destination => &self.dst,
        };
        let now = coordinator.ledger().current_time().await?;
        let window = TimelockScheduler::schedule(now, self.record.order.offsets(leg))?;
        match leg {
            Leg::Source => self.record.src_window = Some(window),
            Leg::Destination => self.record.dst_window = Some(window),
        }
        self.persist().await?;

        tracing::debug!(
            swap = %self.record.swap_id.short(),
            %leg,
            locked_at = %window.locked_at,
            cancellation = %window.cancellation,
            "window scheduled"
        );
        Ok(window)
    }

    fn window(&self, leg: Leg) -> Result<TimeLockWindow, SwapError> {
        self.record
            .window(leg)
            .copied()
            .ok_or(SwapError::MissingWindow(leg))
    }

    async fn try_cancel(&mut self, leg: Leg) {
        let order = &self.record.order;
        let (coordinator, caller) = match leg {
            Leg::Source => (&mut self.src, &order.maker.src),
            Leg::Destination => (&mut self.dst, &order.resolver.dst),
        };
        match coordinator.cancel(caller).await {
            Ok(_) | Err(EscrowError::AlreadySettled(_)) => {}
            Err(e) => {
                tracing::warn!(swap = %order.id.short(), %leg, error = %e, "refund attempt failed");
            }
        }
    }

    fn on_lock_error(&mut self, leg: Leg, err: EscrowError) -> Step {
        match err {
            EscrowError::LockRejected(reason) => {
                let reason = CancelReason::LockRejected(reason.to_string());
                Ok(match leg {
                    Leg::Source => self.fail_before_lock(reason),
                    Leg::Destination => self.begin_cancel(reason),
                })
            }
            EscrowError::LockTimeout { .. } => Ok(self.begin_cancel(CancelReason::LockUnconfirmed)),
            e if e.is_transient() => Err(e.into()),
            e => Ok(self.begin_cancel(CancelReason::LockRejected(e.to_string()))),
        }
    }

    fn dst_claimed(&mut self, at: Timestamp) -> Option<SwapEvent> {
        self.record.secret_revealed_at.get_or_insert(at);
        self.record.cancel_reason = None;
        self.secret = None;
        Some(SwapEvent::DstClaimConfirmed)
    }

    fn begin_cancel(&mut self, reason: CancelReason) -> Option<SwapEvent> {
        self.set_reason(reason);
        Some(SwapEvent::BeginCancel)
    }

    fn fail_before_lock(&mut self, reason: CancelReason) -> Option<SwapEvent> {
        self.set_reason(reason);
        Some(SwapEvent::FailedBeforeLock)
    }

    fn set_reason(&mut self, reason: CancelReason) {
        if self.record.cancel_reason.is_none() {
            tracing::warn!(swap = %self.record.swap_id.short(), %reason, "swap stopping");
            self.record.cancel_reason = Some(reason);
        }
    }
}

/// Whether a leg needs no further action to return everyone's funds.
fn leg_resolved(state: EscrowState, window: Option<&TimeLockWindow>, now: Timestamp) -> bool {
    match state {
        EscrowState::Claimed | EscrowState::Cancelled => true,
        EscrowState::Locked => false,
        // A lock that may still land is waited out until it could be refunded.
        EscrowState::Uncommitted => window.map_or(true, |w| now >= w.cancellation),
    }
}
