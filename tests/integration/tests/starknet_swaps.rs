//! Swaps from an EVM chain to a Starknet chain.

use std::sync::Arc;

use crossloc_core::{CancelReason, EscrowState, HashAlgorithm, SwapState};
use crossloc_crypto::matches_lock;
use crossloc_escrow::{LedgerClient, TxKind};
use crossloc_integration_tests::{felt, params, starknet_params, Network};
use crossloc_swap::{MemorySwapStore, SecretCustody};

#[tokio::test(start_paused = true)]
async fn test_evm_to_starknet_moves_both_legs() {
    let net = Network::starknet();
    let p = starknet_params(SecretCustody::Orchestrator);
    net.fund(&p);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::SrcClaimed
    );
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.maker.dst), 95);
    assert_eq!(net.src.balance_of(&p.src_token, &p.resolver.src), 100);

    // One 251-bit preimage opens a Keccak lock and a Poseidon lock.
    let record = orchestrator.get_record(&id).await.unwrap();
    let secret = net
        .dst
        .revealed_secret(&record.dst_escrow)
        .await
        .unwrap()
        .unwrap();
    assert!(secret[0] < 0x08);
    assert!(matches_lock(
        HashAlgorithm::Poseidon,
        &secret,
        &record.order.dst_hash_lock
    ));
    assert!(matches_lock(
        HashAlgorithm::Keccak256,
        &secret,
        &record.order.src_hash_lock
    ));
    assert!(!matches_lock(
        HashAlgorithm::Keccak256,
        &secret,
        &record.order.dst_hash_lock
    ));
}

#[tokio::test(start_paused = true)]
async fn test_evm_to_starknet_refunds_withheld_secret() {
    let net = Network::starknet();
    let p = starknet_params(SecretCustody::Maker);
    net.fund(&p);
    let orchestrator = net.orchestrator(Arc::new(MemorySwapStore::new()));

    let id = orchestrator.start_swap(p.clone()).await.unwrap();
    assert_eq!(
        orchestrator.wait_for_terminal(&id).await.unwrap(),
        SwapState::Cancelled
    );
    let record = orchestrator.get_record(&id).await.unwrap();
    assert_eq!(record.cancel_reason, Some(CancelReason::SecretWithheld));
    assert_eq!(net.dst.escrow_state(&id), EscrowState::Cancelled);
    assert_eq!(net.src.escrow_state(&id), EscrowState::Cancelled);
    assert_eq!(net.src.balance_of(&p.src_token, &p.maker.src), 100);
    assert_eq!(net.dst.balance_of(&p.dst_token, &p.resolver.dst), 95);
    assert_eq!(net.dst.submission_count(TxKind::Claim), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stellar_addresses_rejected_on_starknet() {
    let net = Network::starknet();
    let mut p = params(SecretCustody::Orchestrator);
    p.dst_token = crossloc_core::Address::new(&felt(0x0C));
    let store = Arc::new(MemorySwapStore::new());
    let orchestrator = net.orchestrator(store.clone());

    assert!(orchestrator.start_swap(p).await.is_err());
    assert!(store.is_empty());
}
