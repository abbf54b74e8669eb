//! Shared fixtures for this crate's unit tests.

use crossloc_core::{
    Address, ChainFamily, ChainId, ChainSpec, HashAlgorithm, HashSpec, PartyAddresses, SwapConfig,
    SwapOrder, TimelockPreset, Timestamp,
};
use crossloc_crypto::{sign_order, KeyPair, OrderSignature};
use crossloc_escrow::SimulatedLedger;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::orchestrator::{LegBinding, SwapOrchestrator, SwapParams};
use crate::record::SecretCustody;
use crate::store::SwapStore;

pub(crate) fn evm(b: u8) -> String {
    format!("0x{}", hex::encode([b; 20]))
}

fn src_spec() -> ChainSpec {
    ChainSpec::new(1, "src", ChainFamily::Evm, &evm(0xE1))
}

/// Destination hashes with SHA-256 over a 248-bit secret.
fn dst_spec() -> ChainSpec {
    ChainSpec::new(2, "dst", ChainFamily::Evm, &evm(0xE2)).with_hash(HashSpec {
        algorithm: HashAlgorithm::Sha256,
        secret_bits: 248,
    })
}

pub(crate) fn signed_order() -> (SwapOrder, OrderSignature) {
    let (src, dst) = (src_spec(), dst_spec());
    let (_, locks) = crossloc_crypto::generate(&[(src.id, src.hash), (dst.id, dst.hash)]).unwrap();
    let order = SwapOrder::builder()
        .chains(src, dst)
        .maker(PartyAddresses::new(&evm(1), &evm(1)))
        .resolver(PartyAddresses::new(&evm(2), &evm(2)))
        .tokens(Address::new(&evm(3)), Address::new(&evm(4)))
        .amounts(100, 95)
        .hash_locks(locks[&ChainId(1)], locks[&ChainId(2)])
        .timelocks(TimelockPreset::Fast.timelocks())
        .build()
        .unwrap();
    let signature = sign_order(&order, &KeyPair::generate());
    (order, signature)
}

pub(crate) fn params(custody: SecretCustody) -> SwapParams {
    SwapParams {
        maker: PartyAddresses::new(&evm(1), &evm(1)),
        resolver: PartyAddresses::new(&evm(2), &evm(2)),
        src_token: Address::new(&evm(3)),
        dst_token: Address::new(&evm(4)),
        making_amount: 100,
        taking_amount: 95,
        timelocks: Some(TimelockPreset::Fast.timelocks()),
        custody,
    }
}

/// Two simulated chains with unrelated clocks.
pub(crate) struct Chains {
    pub src: Arc<SimulatedLedger>,
    pub dst: Arc<SimulatedLedger>,
}

impl Chains {
    pub fn new() -> Self {
        Self {
            src: Arc::new(SimulatedLedger::new(src_spec(), Timestamp(1_700_000_000))),
            dst: Arc::new(SimulatedLedger::new(dst_spec(), Timestamp(1_650_000_000))),
        }
    }

    pub fn fund(&self, p: &SwapParams) {
        self.src.fund(&p.src_token, &p.maker.src, p.making_amount);
        self.dst.fund(&p.dst_token, &p.resolver.dst, p.taking_amount);
    }

    pub fn orchestrator(&self, store: Arc<dyn SwapStore>) -> SwapOrchestrator {
        let config = SwapConfig {
            poll_interval_ms: 1_000,
            confirmation_timeout_ms: 2_000,
            max_submit_attempts: 3,
            timelock_preset: TimelockPreset::Fast,
        };
        SwapOrchestrator::new(
            LegBinding::simulated(self.src.clone()),
            LegBinding::simulated(self.dst.clone()),
            store,
            config,
            KeyPair::generate(),
        )
    }
}

pub(crate) fn unique_temp_dir(tag: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "crossloc-swap-{}-{}-{}-{}",
        tag,
        std::process::id(),
        chrono::Utc::now().timestamp_micros(),
        n
    ))
}
