//! CrossLoc node: wires the configured chains, store and orchestrator together.

use anyhow::Result;
use crossloc_core::{SwapState, Timestamp};
use crossloc_crypto::KeyPair;
use crossloc_escrow::SimulatedLedger;
use crossloc_swap::{
    FileSwapStore, LegBinding, MemorySwapStore, SecretCustody, SwapError, SwapId,
    SwapOrchestrator, SwapStore,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ChainConfig, CrosslocConfig};

/// Outcome of one swap, for the final report.
#[derive(Debug)]
pub struct SwapOutcome {
    pub swap_id: SwapId,
    pub state: Option<SwapState>,
    pub detail: String,
}

pub struct CrosslocNode {
    config: CrosslocConfig,
    src: Arc<SimulatedLedger>,
    dst: Arc<SimulatedLedger>,
    orchestrator: SwapOrchestrator,
}

impl CrosslocNode {
    /// Create a node from configuration.
    pub fn new(config: CrosslocConfig) -> Result<Self> {
        if config.chains.src.id == config.chains.dst.id {
            anyhow::bail!(
                "source and destination chains share id {}",
                config.chains.src.id
            );
        }
        let src = Arc::new(simulated_chain(&config.chains.src));
        let dst = Arc::new(simulated_chain(&config.chains.dst));

        let store: Arc<dyn SwapStore> = match &config.storage.data_dir {
            Some(dir) => {
                tracing::info!(path = %dir.display(), "using file swap store");
                Arc::new(FileSwapStore::open(dir)?)
            }
            None => Arc::new(MemorySwapStore::new()),
        };

        let signer = match &config.demo.signer_seed {
            Some(seed) => KeyPair::from_hex(seed)?,
            None => KeyPair::generate(),
        };

        let orchestrator = SwapOrchestrator::new(
            LegBinding::simulated(src.clone()),
            LegBinding::simulated(dst.clone()),
            store,
            config.swap.clone(),
            signer,
        );

        Ok(Self {
            config,
            src,
            dst,
            orchestrator,
        })
    }

    /// Run the simulated chain clocks faster than wall-clock time.
    pub fn start_clock(&self) {
        let speed = self.config.demo.clock_speed;
        if speed <= 1 {
            return;
        }
        let (src, dst) = (self.src.clone(), self.dst.clone());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                src.advance(speed - 1);
                dst.advance(speed - 1);
            }
        });
        tracing::info!(speed, "simulated chain clocks running fast");
    }

    /// Resume every unfinished swap found in the store.
    pub async fn recover_pending(&self) -> Result<Vec<SwapId>> {
        let mut recovered = Vec::new();
        for record in self.orchestrator.list_swaps().await? {
            if record.is_final() {
                continue;
            }
            let state = self.orchestrator.recover(&record.swap_id).await?;
            tracing::info!(swap = %record.swap_id.short(), %state, "resumed unfinished swap");
            recovered.push(record.swap_id);
        }
        Ok(recovered)
    }

    /// Fund the configured parties and start `count` swaps concurrently.
    pub async fn start_swaps(&self, count: usize, withhold_secret: bool) -> Result<Vec<SwapId>> {
        let mut params = self.config.demo.swap_params();
        if withhold_secret {
            params.custody = SecretCustody::Maker;
        }

        for _ in 0..count {
            self.src
                .fund(&params.src_token, &params.maker.src, params.making_amount);
            self.dst
                .fund(&params.dst_token, &params.resolver.dst, params.taking_amount);
        }

        let starts = (0..count).map(|_| self.orchestrator.start_swap(params.clone()));
        let ids = keep_started(futures::future::join_all(starts).await)?;

        if params.custody == SecretCustody::Maker && !withhold_secret {
            for id in &ids {
                self.release_when_locked(*id);
            }
        }
        Ok(ids)
    }

    /// Play the maker: release the secret once both legs are locked.
    fn release_when_locked(&self, swap_id: SwapId) {
        let orchestrator = self.orchestrator.clone();
        let poll = self.config.swap.poll_interval();
        tokio::spawn(async move {
            loop {
                match orchestrator.get_status(&swap_id).await {
                    Ok(SwapState::DstLocked) => {
                        if let Err(e) = orchestrator.release_secret(&swap_id) {
                            tracing::warn!(swap = %swap_id.short(), error = %e, "release failed");
                        }
                        return;
                    }
                    Ok(state) if state.is_final() || state == SwapState::Cancelling => return,
                    Ok(_) => tokio::time::sleep(poll).await,
                    Err(e) => {
                        tracing::warn!(swap = %swap_id.short(), error = %e, "status unavailable");
                        return;
                    }
                }
            }
        });
    }

    /// Wait for every swap in `ids` to finish.
    pub async fn wait_all(&self, ids: &[SwapId]) -> Vec<SwapOutcome> {
        let waits = ids.iter().map(|id| async move {
            let result = self.orchestrator.wait_for_terminal(id).await;
            let detail = match &result {
                Ok(_) => match self.orchestrator.get_record(id).await {
                    Ok(record) => record
                        .cancel_reason
                        .map(|r| r.to_string())
                        .unwrap_or_default(),
                    Err(e) => e.to_string(),
                },
                Err(e) => e.to_string(),
            };
            SwapOutcome {
                swap_id: *id,
                state: result.ok(),
                detail,
            }
        });
        futures::future::join_all(waits).await
    }

    /// Log the outcome of each swap and the parties' balances.
    pub fn report(&self, outcomes: &[SwapOutcome]) {
        for outcome in outcomes {
            match outcome.state {
                Some(state) => tracing::info!(
                    swap = %outcome.swap_id,
                    %state,
                    reason = %outcome.detail,
                    "swap finished"
                ),
                None => tracing::warn!(
                    swap = %outcome.swap_id,
                    error = %outcome.detail,
                    "swap did not finish"
                ),
            }
        }

        let p = self.config.demo.swap_params();
        tracing::info!(
            maker_src = self.src.balance_of(&p.src_token, &p.maker.src),
            resolver_src = self.src.balance_of(&p.src_token, &p.resolver.src),
            maker_dst = self.dst.balance_of(&p.dst_token, &p.maker.dst),
            resolver_dst = self.dst.balance_of(&p.dst_token, &p.resolver.dst),
            "final balances"
        );
    }

    /// Drop finished swaps from the store, if configured to.
    pub async fn prune_finished(&self) -> Result<usize> {
        if !self.config.storage.prune_finished {
            return Ok(0);
        }
        Ok(self.orchestrator.prune_finished().await?)
    }

    /// Stop all swap drivers; unfinished swaps stay in the store.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down CrossLoc node");
        self.orchestrator.shutdown().await;
    }
}

/// Ids of the swaps that started. Failed starts are logged and skipped;
/// only a batch where nothing started is an error.
fn keep_started(results: Vec<Result<SwapId, SwapError>>) -> Result<Vec<SwapId>> {
    let total = results.len();
    let mut ids = Vec::with_capacity(total);
    let mut first_error = None;
    for result in results {
        match result {
            Ok(id) => ids.push(id),
            Err(e) => {
                tracing::warn!(error = %e, "failed to start swap");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if ids.is_empty() => Err(e.into()),
        Some(_) => {
            tracing::warn!(started = ids.len(), total, "some swaps failed to start");
            Ok(ids)
        }
        None => Ok(ids),
    }
}

fn simulated_chain(chain: &ChainConfig) -> SimulatedLedger {
    SimulatedLedger::new(chain.to_spec(), Timestamp(chain.genesis))
        .with_confirmation_delay(Duration::from_millis(chain.confirmation_delay_ms))
}
