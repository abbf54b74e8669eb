//! Swap orchestrator: the public surface for starting and observing swaps.

use crossloc_core::{
    Address, Amount, CancelReason, ChainId, ChainSpec, EscrowState, HashLock, Leg,
    PartyAddresses, SwapConfig, SwapOrder, SwapState, SwapTimelocks,
};
use crossloc_crypto::{sign_order, verify_order, KeyPair, Secret};
use crossloc_escrow::{EscrowLegCoordinator, LedgerClient, SimulatedLedger, TokenGateway};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::driver::{SwapControls, SwapDriver};
use crate::error::SwapError;
use crate::record::{SecretCustody, SwapId, SwapRecord};
use crate::store::SwapStore;

/// One chain the orchestrator is bound to.
#[derive(Clone)]
pub struct LegBinding {
    pub spec: ChainSpec,
    pub ledger: Arc<dyn LedgerClient>,
    pub gateway: Arc<dyn TokenGateway>,
}

impl LegBinding {
    pub fn new(
        spec: ChainSpec,
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn TokenGateway>,
    ) -> Self {
        Self {
            spec,
            ledger,
            gateway,
        }
    }

    /// Bind a simulated chain, which serves as both ledger and token gateway.
    pub fn simulated(ledger: Arc<SimulatedLedger>) -> Self {
        Self {
            spec: ledger.spec().clone(),
            ledger: ledger.clone(),
            gateway: ledger,
        }
    }
}

/// What a caller supplies to start a swap.
#[derive(Debug, Clone)]
pub struct SwapParams {
    pub maker: PartyAddresses,
    pub resolver: PartyAddresses,
    pub src_token: Address,
    pub dst_token: Address,
    pub making_amount: Amount,
    pub taking_amount: Amount,
    /// Defaults to the configured preset.
    pub timelocks: Option<SwapTimelocks>,
    pub custody: SecretCustody,
}

struct SwapHandle {
    controls: Arc<SwapControls>,
    status: watch::Receiver<SwapState>,
    task: Option<JoinHandle<SwapState>>,
}

struct Inner {
    src: LegBinding,
    dst: LegBinding,
    store: Arc<dyn SwapStore>,
    config: SwapConfig,
    signer: KeyPair,
    handles: DashMap<SwapId, SwapHandle>,
}

/// Runs swaps between one source and one destination chain.
///
/// Each swap is driven by its own task; swaps share nothing but the chain
/// bindings and the store. Cheap to clone.
#[derive(Clone)]
pub struct SwapOrchestrator {
    inner: Arc<Inner>,
}

impl SwapOrchestrator {
    pub fn new(
        src: LegBinding,
        dst: LegBinding,
        store: Arc<dyn SwapStore>,
        config: SwapConfig,
        signer: KeyPair,
    ) -> Self {
        tracing::info!(
            src = %src.spec.name,
            dst = %dst.spec.name,
            preset = %config.timelock_preset,
            signer = %signer.public_key().to_hex(),
            "swap orchestrator ready"
        );
        Self {
            inner: Arc::new(Inner {
                src,
                dst,
                store,
                config,
                signer,
                handles: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &SwapConfig {
        &self.inner.config
    }

    /// Build, sign and persist a new order, then start driving it.
    ///
    /// Fails before anything is written if the secret cannot be generated or
    /// the order is invalid.
    pub async fn start_swap(&self, params: SwapParams) -> Result<SwapId, SwapError> {
        let src = &self.inner.src.spec;
        let dst = &self.inner.dst.spec;
        let (secret, locks) = crossloc_crypto::generate(&[(src.id, src.hash), (dst.id, dst.hash)])?;
        self.launch(params, secret, &locks).await
    }

    async fn launch(
        &self,
        params: SwapParams,
        secret: Secret,
        locks: &BTreeMap<ChainId, HashLock>,
    ) -> Result<SwapId, SwapError> {
        let src = &self.inner.src.spec;
        let dst = &self.inner.dst.spec;
        let lock_for = |chain: ChainId| {
            locks
                .get(&chain)
                .copied()
                .ok_or_else(|| SwapError::InvalidParams(format!("no hash-lock for chain {}", chain)))
        };

        let order = SwapOrder::builder()
            .chains(src.clone(), dst.clone())
            .maker(params.maker)
            .resolver(params.resolver)
            .tokens(params.src_token, params.dst_token)
            .amounts(params.making_amount, params.taking_amount)
            .hash_locks(lock_for(src.id)?, lock_for(dst.id)?)
            .timelocks(
                params
                    .timelocks
                    .unwrap_or_else(|| self.inner.config.timelock_preset.timelocks()),
            )
            .build()?;

        let signature = sign_order(&order, &self.inner.signer);
        verify_order(&order, &signature)?;

        let swap_id = order.id;
        if self.inner.handles.contains_key(&swap_id)
            || self.inner.store.load(&swap_id).await?.is_some()
        {
            return Err(SwapError::AlreadyExists(swap_id));
        }

        let record = SwapRecord::new(order, signature, params.custody);
        self.inner.store.save(&record).await?;

        tracing::info!(
            swap = %swap_id.short(),
            src = %src.name,
            dst = %dst.name,
            making = record.order.making_amount,
            taking = record.order.taking_amount,
            custody = ?record.custody,
            "swap started"
        );

        self.spawn(record, Some(secret));
        Ok(swap_id)
    }

    /// Current state: live from the driver, otherwise from the store.
    pub async fn get_status(&self, swap_id: &SwapId) -> Result<SwapState, SwapError> {
        let live = self
            .inner
            .handles
            .get(swap_id)
            .map(|h| *h.status.borrow());
        if let Some(state) = live {
            return Ok(state);
        }
        self.get_record(swap_id).await.map(|r| r.state)
    }

    /// Last persisted record of a swap.
    pub async fn get_record(&self, swap_id: &SwapId) -> Result<SwapRecord, SwapError> {
        self.inner
            .store
            .load(swap_id)
            .await?
            .ok_or(SwapError::NotFound(*swap_id))
    }

    pub async fn list_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.inner.store.list().await
    }

    /// Ask a swap to stop advancing.
    ///
    /// Advisory: transactions already sent stay sent, and the swap then waits
    /// for its locked legs to become refundable. Returns `false` when the swap
    /// is past the point where stopping is safe (the secret is public) or
    /// already finished.
    pub async fn abort(&self, swap_id: &SwapId) -> Result<bool, SwapError> {
        let controls = self.controls(swap_id);
        let state = self.get_status(swap_id).await?;
        let Some(controls) = controls else {
            return Ok(false);
        };
        if !state.is_abortable() {
            tracing::info!(swap = %swap_id.short(), %state, "abort refused");
            return Ok(false);
        }
        tracing::info!(swap = %swap_id.short(), %state, "abort requested");
        controls.request_abort();
        Ok(true)
    }

    /// Let a maker-custody swap reveal its secret on the destination chain.
    pub fn release_secret(&self, swap_id: &SwapId) -> Result<(), SwapError> {
        let controls = self
            .controls(swap_id)
            .ok_or(SwapError::NotFound(*swap_id))?;
        tracing::info!(swap = %swap_id.short(), "secret release authorized");
        controls.release_secret();
        Ok(())
    }

    /// Resume a persisted swap after a restart.
    ///
    /// Both legs are re-read from their chains and the record is reconciled
    /// with what they show before the swap is driven again. The secret does
    /// not survive a restart, so a swap that had not revealed yet can only be
    /// refunded.
    pub async fn recover(&self, swap_id: &SwapId) -> Result<SwapState, SwapError> {
        let live = self
            .inner
            .handles
            .get(swap_id)
            .filter(|h| h.task.as_ref().is_some_and(|t| !t.is_finished()))
            .map(|h| *h.status.borrow());
        if let Some(state) = live {
            return Ok(state);
        }

        let mut record = self.get_record(swap_id).await?;
        if record.is_final() {
            return Ok(record.state);
        }
        if !record.order.verify_id() {
            return Err(SwapError::Storage(format!(
                "record {} does not match its order",
                swap_id
            )));
        }

        let mut src = self.coordinator(Leg::Source, &record);
        let mut dst = self.coordinator(Leg::Destination, &record);
        let src_state = src.refresh().await?;
        let dst_state = dst.refresh().await?;

        let previous = record.state;
        record.src_state = src_state;
        record.dst_state = dst_state;
        record.state = if src_state == EscrowState::Claimed {
            SwapState::SrcClaimed
        } else if dst_state == EscrowState::Claimed {
            if record.secret_revealed_at.is_none() {
                record.secret_revealed_at = Some(self.inner.dst.ledger.current_time().await?);
            }
            SwapState::SecretRevealed
        } else {
            match record.state {
                SwapState::Created | SwapState::SrcLocked | SwapState::DstLocked => {
                    record
                        .cancel_reason
                        .get_or_insert(CancelReason::SecretUnavailable);
                    SwapState::Cancelling
                }
                other => other,
            }
        };
        record.touch();
        self.inner.store.save(&record).await?;

        tracing::info!(
            swap = %swap_id.short(),
            from = %previous,
            to = %record.state,
            src = %src_state,
            dst = %dst_state,
            "swap recovered"
        );

        let state = record.state;
        if !record.is_final() {
            self.spawn_with(record, None, src, dst);
        }
        Ok(state)
    }

    /// Wait until a swap reaches a final state.
    pub async fn wait_for_terminal(&self, swap_id: &SwapId) -> Result<SwapState, SwapError> {
        let status = self.inner.handles.get(swap_id).map(|h| h.status.clone());
        match status {
            Some(mut status) => {
                let state = *status
                    .wait_for(|s| s.is_final())
                    .await
                    .map_err(|_| SwapError::TaskEnded(*swap_id))?;
                Ok(state)
            }
            None => {
                let record = self.get_record(swap_id).await?;
                if record.is_final() {
                    Ok(record.state)
                } else {
                    Err(SwapError::TaskEnded(*swap_id))
                }
            }
        }
    }

    /// Remove every finished swap from the store. Returns how many were removed.
    pub async fn prune_finished(&self) -> Result<usize, SwapError> {
        let removed = self.inner.store.prune_terminal().await?;
        if removed > 0 {
            tracing::info!(removed, "pruned finished swaps");
        }
        Ok(removed)
    }

    /// Number of swaps whose driver is still running.
    pub fn active_swaps(&self) -> usize {
        self.inner
            .handles
            .iter()
            .filter(|h| h.task.as_ref().is_some_and(|t| !t.is_finished()))
            .count()
    }

    /// Stop every driver and wait for them to exit. Swap states are left as
    /// persisted; [`recover`](Self::recover) picks them up again.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<SwapState>> = self
            .inner
            .handles
            .iter_mut()
            .filter_map(|mut h| {
                h.controls.stop();
                h.task.take()
            })
            .collect();
        tracing::info!(drivers = tasks.len(), "stopping swap drivers");
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "swap driver panicked");
            }
        }
    }

    fn controls(&self, swap_id: &SwapId) -> Option<Arc<SwapControls>> {
        self.inner
            .handles
            .get(swap_id)
            .map(|h| h.controls.clone())
    }

    fn coordinator(&self, leg: Leg, record: &SwapRecord) -> EscrowLegCoordinator {
        let (binding, escrow, state) = match leg {
            Leg::Source => (&self.inner.src, &record.src_escrow, record.src_state),
            Leg::Destination => (&self.inner.dst, &record.dst_escrow, record.dst_state),
        };
        EscrowLegCoordinator::resume(
            binding.ledger.clone(),
            escrow.clone(),
            record.window(leg).copied(),
            state,
            &self.inner.config,
        )
    }

    fn spawn(&self, record: SwapRecord, secret: Option<Secret>) {
        let src = self.coordinator(Leg::Source, &record);
        let dst = self.coordinator(Leg::Destination, &record);
        self.spawn_with(record, secret, src, dst);
    }

    fn spawn_with(
        &self,
        record: SwapRecord,
        secret: Option<Secret>,
        src: EscrowLegCoordinator,
        dst: EscrowLegCoordinator,
    ) {
        let swap_id = record.swap_id;
        let controls = Arc::new(SwapControls::default());
        let (status_tx, status_rx) = watch::channel(record.state);

        let driver = SwapDriver {
            record,
            src,
            dst,
            src_gateway: self.inner.src.gateway.clone(),
            dst_gateway: self.inner.dst.gateway.clone(),
            store: self.inner.store.clone(),
            secret,
            controls: controls.clone(),
            status: status_tx,
            poll: self.inner.config.poll_interval(),
            allowances_ready: false,
        };

        // Registered before the task starts so a fast finish can remove it.
        self.inner.handles.insert(
            swap_id,
            SwapHandle {
                controls,
                status: status_rx,
                task: None,
            },
        );

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let state = driver.run().await;
            // A final state is already in the store; stopped drivers stay
            // registered so callers can tell they ended early.
            if state.is_final() {
                inner.handles.remove(&swap_id);
            }
            tracing::debug!(swap = %swap_id.short(), %state, "swap driver exited");
            state
        });

        if let Some(mut handle) = self.inner.handles.get_mut(&swap_id) {
            handle.task = Some(task);
        }
    }
}
