//! Fixtures shared by the CrossLoc integration scenarios.
//!
//! The default network is an EVM source chain (Keccak-256 hash-locks) and a
//! Stellar destination chain (SHA-256 hash-locks), each with its own clock.
//! [`Network::starknet`] swaps the destination for a Starknet chain with
//! Poseidon hash-locks over a 251-bit secret.

use std::sync::Arc;
use std::time::Duration;

use crossloc_core::{
    Address, ChainFamily, ChainSpec, HashAlgorithm, HashSpec, PartyAddresses, SwapConfig,
    SwapState, TimelockPreset, Timestamp,
};
use crossloc_crypto::KeyPair;
use crossloc_escrow::SimulatedLedger;
use crossloc_swap::{LegBinding, SecretCustody, SwapId, SwapOrchestrator, SwapParams, SwapStore};

pub fn evm(b: u8) -> String {
    format!("0x{}", hex::encode([b; 20]))
}

/// A checksummed Stellar strkey: `kind` is `G` (account) or `C` (contract).
pub fn stellar(kind: char, fill: char) -> String {
    let key = [fill as u8; 32];
    match kind {
        'C' => stellar_strkey::Contract(key).to_string(),
        _ => stellar_strkey::ed25519::PublicKey(key).to_string(),
    }
}

/// A Starknet contract address (a felt below 2^251).
pub fn felt(b: u8) -> String {
    format!("0x0{}", hex::encode([b; 31]))
}

pub fn src_spec() -> ChainSpec {
    ChainSpec::new(1, "ethereum-sim", ChainFamily::Evm, &evm(0xE1))
}

pub fn dst_spec() -> ChainSpec {
    ChainSpec::new(148, "stellar-sim", ChainFamily::Stellar, &stellar('C', 'E')).with_hash(
        HashSpec {
            algorithm: HashAlgorithm::Sha256,
            secret_bits: 256,
        },
    )
}

pub fn starknet_spec() -> ChainSpec {
    ChainSpec::new(9, "starknet-sim", ChainFamily::Starknet, &felt(0xE5))
}

pub fn params(custody: SecretCustody) -> SwapParams {
    SwapParams {
        maker: PartyAddresses::new(&evm(1), &stellar('G', 'M')),
        resolver: PartyAddresses::new(&evm(2), &stellar('G', 'R')),
        src_token: Address::new(&evm(3)),
        dst_token: Address::new(&stellar('C', 'T')),
        making_amount: 100,
        taking_amount: 95,
        timelocks: Some(TimelockPreset::Fast.timelocks()),
        custody,
    }
}

/// [`params`] with Starknet accounts and token on the destination side.
pub fn starknet_params(custody: SecretCustody) -> SwapParams {
    let mut p = params(custody);
    p.maker.dst = Address::new(&felt(0x0A));
    p.resolver.dst = Address::new(&felt(0x0B));
    p.dst_token = Address::new(&felt(0x0C));
    p
}

pub fn fast_config() -> SwapConfig {
    SwapConfig {
        poll_interval_ms: 1_000,
        confirmation_timeout_ms: 2_000,
        max_submit_attempts: 3,
        timelock_preset: TimelockPreset::Fast,
    }
}

/// Two simulated chains whose clocks start far apart.
pub struct Network {
    pub src: Arc<SimulatedLedger>,
    pub dst: Arc<SimulatedLedger>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            src: Arc::new(SimulatedLedger::new(src_spec(), Timestamp(1_700_000_000))),
            dst: Arc::new(SimulatedLedger::new(dst_spec(), Timestamp(1_699_990_000))),
        }
    }

    /// EVM source, Starknet destination.
    pub fn starknet() -> Self {
        Self {
            src: Arc::new(SimulatedLedger::new(src_spec(), Timestamp(1_700_000_000))),
            dst: Arc::new(SimulatedLedger::new(starknet_spec(), Timestamp(1_700_050_000))),
        }
    }

    /// Mint the maker's source funds and the resolver's destination funds.
    pub fn fund(&self, p: &SwapParams) {
        self.src.fund(&p.src_token, &p.maker.src, p.making_amount);
        self.dst.fund(&p.dst_token, &p.resolver.dst, p.taking_amount);
    }

    pub fn orchestrator(&self, store: Arc<dyn SwapStore>) -> SwapOrchestrator {
        SwapOrchestrator::new(
            LegBinding::simulated(self.src.clone()),
            LegBinding::simulated(self.dst.clone()),
            store,
            fast_config(),
            KeyPair::generate(),
        )
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll until the swap is in `state`. Panics after `limit` of runtime time.
pub async fn wait_for_state(
    orchestrator: &SwapOrchestrator,
    swap_id: &SwapId,
    state: SwapState,
    limit: Duration,
) {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let current = orchestrator.get_status(swap_id).await.unwrap();
        if current == state {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "swap stuck in {} waiting for {}",
            current,
            state
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

pub fn temp_dir(tag: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    std::env::temp_dir().join(format!(
        "crossloc-it-{}-{}-{}",
        tag,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ))
}
