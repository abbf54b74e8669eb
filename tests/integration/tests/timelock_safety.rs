//! Cross-leg timing guarantees of the shipped presets.

use std::sync::Arc;

use crossloc_core::{LegOffsets, SwapTimelocks, TimelockPreset, TimelockScheduler, Timestamp};
use crossloc_integration_tests::{params, Network};
use crossloc_swap::{MemorySwapStore, SecretCustody};

/// For any destination lock inside the allowed delay, the destination is
/// fully resolved (plus margin) while the source is still claimable.
fn assert_resolver_protected(timelocks: &SwapTimelocks) {
    let src = TimelockScheduler::schedule(Timestamp(0), &timelocks.src).unwrap();
    let max_delay = timelocks.max_dst_lock_delay();

    let step = (max_delay / 50).max(1);
    let mut delay = 0;
    while delay <= max_delay {
        let dst = TimelockScheduler::schedule(Timestamp(delay), &timelocks.dst).unwrap();
        let last_dst_claim = dst
            .public_cancellation
            .unwrap_or(dst.cancellation)
            .0
            .saturating_sub(1);
        let src_claim_by = Timestamp(last_dst_claim + timelocks.resolution_margin);
        let phase = TimelockScheduler::phase(&src, src_claim_by);
        assert!(
            phase.can_claim(),
            "dst locked at +{}s: src is {} when the resolver must claim",
            delay,
            phase
        );
        delay += step;
    }
}

#[test]
fn test_presets_are_valid_and_safe() {
    for preset in TimelockPreset::ALL {
        let timelocks = preset.timelocks();
        timelocks.validate().unwrap();
        assert!(timelocks.max_dst_lock_delay() > 0, "{} leaves no time", preset);
        assert_resolver_protected(&timelocks);
    }
}

#[test]
fn test_dst_outliving_src_is_rejected() {
    let mut timelocks = TimelockPreset::Fast.timelocks();
    timelocks.dst = LegOffsets {
        withdrawal: 10,
        public_withdrawal: 100,
        cancellation: 400,
        public_cancellation: None,
    };
    assert!(timelocks.validate().is_err());
    assert_eq!(timelocks.max_dst_lock_delay(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unsafe_timelocks_never_reach_a_chain() {
    let net = Network::new();
    let mut p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    let mut timelocks = TimelockPreset::Fast.timelocks();
    timelocks.resolution_margin = 200;
    p.timelocks = Some(timelocks);

    let store = Arc::new(MemorySwapStore::new());
    let orchestrator = net.orchestrator(store.clone());
    assert!(orchestrator.start_swap(p).await.is_err());
    assert!(store.is_empty());
    assert_eq!(orchestrator.active_swaps(), 0);
}
