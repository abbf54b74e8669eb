//! End-to-end swap scenarios across two simulated chains.

use std::sync::Arc;
use std::time::Duration;

use crossloc_core::{CancelReason, EscrowState, SwapState};
use crossloc_escrow::TxKind;
use crossloc_integration_tests::{params, temp_dir, wait_for_state, Network};
use crossloc_swap::{FileSwapStore, MemorySwapStore, SecretCustody, SwapStore};

#[tokio::test(start_paused = true)]
async fn test_happy_path_moves_both_legs() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    let state = orchestrator.wait_for_terminal(&id).await.unwrap();
    assert_eq!(state, SwapState::SrcClaimed);

    assert_eq!(net.src.balance_of(&p.src_token, &p.resolver.src), 100);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 0);
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.maker.dst), 95);
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.resolver.dst), 0);
    assert_eq!(net.src.escrow_state(&id), EscrowState::Claimed);
    assert_eq!(net.dst.escrow_state(&id), EscrowState::Claimed);

    let record = orchestrator.get_record(&id).await.unwrap();
    assert!(record.secret_revealed_at.is_some());
    assert!(record.cancel_reason.is_none());
    assert_eq!(record.src_state, EscrowState::Claimed);
    assert_eq!(record.dst_state, EscrowState::Claimed);
    assert_eq!(net.src.submission_count(TxKind::Claim), 1);
    assert_eq!(net.dst.submission_count(TxKind::Claim), 1);
}

#[tokio::test(start_paused = true)]
async fn test_each_chain_checks_its_own_hash_lock() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p).await.unwrap();
    let record = orchestrator.get_record(&id).await.unwrap();
    assert_ne!(record.order.src_hash_lock, record.order.dst_hash_lock);

    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::SrcClaimed
    );
}

#[tokio::test(start_paused = true)]
async fn test_withheld_secret_refunds_both_legs() {
    let net = Network::new();
    let p = params(SecretCustody::Maker);
    net.fund(&p);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    let state = orchestrator.wait_for_terminal(&id).await.unwrap();
    assert_eq!(state, SwapState::Cancelled);

    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::SecretWithheld));
    assert!(record.secret_revealed_at.is_none());

    assert_eq!(net.src.submission_count(TxKind::Claim), 0);
    assert_eq!(net.dst.submission_count(TxKind::Claim), 0);
    assert_eq!(net.src.escrow_state(&id), EscrowState::Cancelled);
    assert_eq!(net.dst.escrow_state(&id), EscrowState::Cancelled);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.resolver.dst), 95);

    // The source refund only happened once its own cancellation window opened.
    let src_window = record.src_window.unwrap();
    assert!(net.src.now() >= src_window.cancellation);
}

#[tokio::test(start_paused = true)]
async fn test_abort_after_both_locks_refunds() {
    let net = Network::new();
    let p = params(SecretCustody::Maker);
    net.fund(&p);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    wait_for_state(&orchestrator, &id, SwapState::DstLocked, Duration::from_secs(30)).await;

    assert!(orchestrator.abort(&id).await.unwrap());
    let state = orchestrator.wait_for_terminal(&id).await.unwrap();
    assert_eq!(state, SwapState::Cancelled);

    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::Aborted));
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.resolver.dst), 95);

    // Finished swaps can no longer be aborted.
    assert!(!orchestrator.abort(&id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_released_secret_completes_maker_custody_swap() {
    let net = Network::new();
    let p = params(SecretCustody::Maker);
    net.fund(&p);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    wait_for_state(&orchestrator, &id, SwapState::DstLocked, Duration::from_secs(30)).await;
    orchestrator.release_secret(&id).unwrap();

    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::SrcClaimed
    );
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.maker.dst), 95);
}

#[tokio::test(start_paused = true)]
async fn test_recovering_finished_swap_submits_nothing() {
    let dir = temp_dir("finished");
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);

    let first = net.orchestrator(Arc::new(FileSwapStore::open(&dir).unwrap()));
    let id = first.start_swap(p).await.unwrap();
    assert_eq!(
        first.wait_for_terminal(&id).await.unwrap(),
        SwapState::SrcClaimed
    );
    first.shutdown().await;

    let before: Vec<u64> = [TxKind::Lock, TxKind::Claim, TxKind::Cancel]
        .into_iter()
        .map(|k| net.src.submission_count(k) + net.dst.submission_count(k))
        .collect();

    let second = net.orchestrator(Arc::new(FileSwapStore::open(&dir).unwrap()));
    assert_eq!(second.recover(&id).await.unwrap(), SwapState::SrcClaimed);
    assert_eq!(second.recover(&id).await.unwrap(), SwapState::SrcClaimed);
    assert_eq!(second.get_status(&id).await.unwrap(), SwapState::SrcClaimed);
    assert_eq!(second.list_swaps().await.unwrap().len(), 1);
    assert_eq!(second.active_swaps(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let after: Vec<u64> = [TxKind::Lock, TxKind::Claim, TxKind::Cancel]
        .into_iter()
        .map(|k| net.src.submission_count(k) + net.dst.submission_count(k))
        .collect();
    assert_eq!(before, after);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_after_dst_claim_learns_secret_from_chain() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    // Every source claim of the first run is lost.
    net.src.drop_transactions(TxKind::Claim, 3);
    let store: Arc<dyn SwapStore> = Arc::new(MemorySwapStore::new());

    let first = net.orchestrator(store.clone());
    let id = first.start_swap(p.clone()).await.unwrap();
    wait_for_state(&first, &id, SwapState::SecretRevealed, Duration::from_secs(60)).await;
    first.shutdown().await;

    assert_eq!(net.dst.escrow_state(&id), EscrowState::Claimed);
    assert_eq!(net.src.escrow_state(&id), EscrowState::Locked);
    assert_eq!(
        first.get_status(&id).await.unwrap(),
        SwapState::SecretRevealed
    );

    let second = net.orchestrator(store);
    assert_eq!(second.recover(&id).await.unwrap(), SwapState::SecretRevealed);
    assert_eq!(
        second.wait_for_terminal(&id).await.unwrap(),
        SwapState::SrcClaimed
    );
    assert_eq!(net.src.balance_of(&p.src_token, &p.resolver.src), 100);
    assert_eq!(net.src.submission_count(TxKind::Claim), 4);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_before_reveal_refunds() {
    let net = Network::new();
    let p = params(SecretCustody::Maker);
    net.fund(&p);
    let store: Arc<dyn SwapStore> = Arc::new(MemorySwapStore::new());

    let first = net.orchestrator(store.clone());
    let id = first.start_swap(p.clone()).await.unwrap();
    wait_for_state(&first, &id, SwapState::DstLocked, Duration::from_secs(30)).await;
    first.shutdown().await;

    let second = net.orchestrator(store);
    assert_eq!(second.recover(&id).await.unwrap(), SwapState::Cancelling);
    assert_eq!(
        second.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );

    let record = second.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::SecretUnavailable));
    assert_eq!(net.dst.submission_count(TxKind::Claim), 0);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.resolver.dst), 95);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_claim_confirmation_is_not_resubmitted() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    net.src.stall_confirmations(TxKind::Claim, 1);
    net.dst.stall_confirmations(TxKind::Lock, 1);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::SrcClaimed
    );
    assert_eq!(net.src.submission_count(TxKind::Claim), 1);
    assert_eq!(net.dst.submission_count(TxKind::Lock), 1);
    assert_eq!(net.src.balance_of(&p.src_token, &p.resolver.src), 100);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_dst_lock_refunds_src() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    net.dst.drop_transactions(TxKind::Lock, 3);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );

    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::LockUnconfirmed));
    assert_eq!(net.dst.submission_count(TxKind::Lock), 3);
    assert_eq!(net.dst.escrow_state(&id), EscrowState::Uncommitted);
    assert_eq!(net.src.escrow_state(&id), EscrowState::Cancelled);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.resolver.dst), 95);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_src_lock_waits_out_its_window() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    net.src.drop_transactions(TxKind::Lock, 3);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );

    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::LockUnconfirmed));
    assert!(record.dst_window.is_none());
    assert!(net.src.now() >= record.src_window.unwrap().cancellation);
    assert_eq!(net.dst.submission_count(TxKind::Lock), 0);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
}

#[tokio::test(start_paused = true)]
async fn test_unfunded_resolver_fails_before_lock() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.src.fund(&p.src_token, &p.maker.src, p.making_amount);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );

    let record = orchestrator.get_record(&id).await.unwrap();
    assert!(matches!(
        record.cancel_reason,
        Some(CancelReason::AllowanceFailed(_))
    ));
    assert!(record.src_window.is_none());
    assert_eq!(net.src.submission_count(TxKind::Lock), 0);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_approval_fails_before_lock() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    net.src.reject_approvals(true);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p).await.unwrap();
    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );
    let record = orchestrator.get_record(&id).await.unwrap();
    assert!(matches!(
        record.cancel_reason,
        Some(CancelReason::AllowanceFailed(_))
    ));
    assert_eq!(net.src.submission_count(TxKind::Lock), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_swaps_settle_independently() {
    const SWAPS: usize = 10;
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    for _ in 0..SWAPS {
        net.fund(&p);
    }
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let starts = (0..SWAPS).map(|_| orchestrator.start_swap(p.clone()));
    let ids: Vec<_> = futures::future::join_all(starts)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(ids.len(), SWAPS);

    let waits = ids.iter().map(|id| orchestrator.wait_for_terminal(id));
    for state in futures::future::join_all(waits).await {
        assert_eq!(state.unwrap(), SwapState::SrcClaimed);
    }

    assert_eq!(
        net.src.balance_of(&p.src_token, &p.resolver.src),
        100 * SWAPS as u128
    );
    assert_eq!(
        net.dst.balance_of(&p.dst_token, &p.maker.dst),
        95 * SWAPS as u128
    );
    assert_eq!(orchestrator.list_swaps().await.unwrap().len(), SWAPS);
}

#[tokio::test(start_paused = true)]
async fn test_records_survive_on_disk() {
    let dir = temp_dir("records");
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);

    let orchestrator = net.orchestrator(Arc::new(FileSwapStore::open(&dir).unwrap()));
    let id = orchestrator.start_swap(p).await.unwrap();
    orchestrator.wait_for_terminal(&id).await.unwrap();

    let path = dir.join(format!("{}.json", id.to_hex()));
    let json = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["state"], "SrcClaimed");
    // The secret itself is never written down.
    assert!(value.get("secret").is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(start_paused = true)]
async fn test_reported_final_state_is_on_disk() {
    const SWAPS: usize = 20;
    let dir = temp_dir("final-states");
    let net = Network::new();
    let orchestrator = net.orchestrator(Arc::new(FileSwapStore::open(&dir).unwrap()));

    let mut ids = Vec::new();
    for i in 0..SWAPS {
        // Every other maker keeps the secret, so those swaps refund.
        let custody = if i % 2 == 0 {
            SecretCustody::Orchestrator
        } else {
            SecretCustody::Maker
        };
        let p = params(custody);
        net.fund(&p);
        ids.push(orchestrator.start_swap(p).await.unwrap());
    }

    let reopened = FileSwapStore::open(&dir).unwrap();
    for (i, id) in ids.iter().enumerate() {
        let reported = orchestrator.wait_for_terminal(id).await.unwrap();
        let expected = if i % 2 == 0 {
            SwapState::SrcClaimed
        } else {
            SwapState::Cancelled
        };
        assert_eq!(reported, expected);
        let stored = reopened.load(id).await.unwrap().unwrap();
        assert_eq!(stored.state, reported, "swap {} reported ahead of disk", i);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

/// Wait until the source lock has executed on-chain.
async fn wait_for_src_lock(net: &Network, id: &crossloc_swap::SwapId) {
    while net.src.escrow_state(id) != EscrowState::Locked {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_src_confirmation_skips_dst_lock() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    net.src.stall_confirmations(TxKind::Lock, 1);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    wait_for_src_lock(&net, &id).await;
    // The source chain moves past the destination lock budget before the
    // lock is confirmed.
    net.src.advance(100);

    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );
    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(
        record.cancel_reason,
        Some(CancelReason::InsufficientTimeBudget)
    );
    assert!(record.dst_window.is_none());
    assert_eq!(net.dst.submission_count(TxKind::Lock), 0);
    assert_eq!(net.src.escrow_state(&id), EscrowState::Cancelled);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
}

#[tokio::test(start_paused = true)]
async fn test_expired_src_window_refunds_immediately() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    net.src.stall_confirmations(TxKind::Lock, 1);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    wait_for_src_lock(&net, &id).await;
    net.src.advance(400);

    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );
    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::SrcWindowElapsed));
    assert_eq!(net.dst.submission_count(TxKind::Lock), 0);
    assert_eq!(net.src.submission_count(TxKind::Cancel), 1);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
}

#[tokio::test(start_paused = true)]
async fn test_src_claim_window_missed_after_reveal() {
    let net = Network::new();
    let p = params(SecretCustody::Orchestrator);
    net.fund(&p);
    net.src.drop_transactions(TxKind::Claim, 3);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    wait_for_state(
        &orchestrator,
        &id,
        SwapState::SecretRevealed,
        Duration::from_secs(60),
    )
    .await;
    net.src.advance(400);

    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );
    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::ClaimWindowMissed));
    assert!(record.secret_revealed_at.is_some());
    assert_eq!(net.dst.escrow_state(&id), EscrowState::Claimed);
    assert_eq!(net.src.escrow_state(&id), EscrowState::Cancelled);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
    assert!(net.src.submission_count(TxKind::Claim) <= 3);
}
