use async_trait::async_trait;
use crossloc_core::{Address, Amount, ChainId, ChainSpec, EscrowState, OrderId, Timestamp};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::EscrowError;
use crate::traits::{LedgerClient, TokenGateway};
use crate::types::{
    EscrowRef, EscrowTx, LockRequest, Receipt, RejectReason, TxHandle, TxKind, TxStatus,
};

/// Chain clock: genesis time plus elapsed runtime time plus manual skew.
///
/// Built on `tokio::time::Instant`, so it follows paused test time.
pub struct SimClock {
    genesis: u64,
    started: Instant,
    skew: AtomicU64,
}

impl SimClock {
    pub fn new(genesis: Timestamp) -> Self {
        Self {
            genesis: genesis.0,
            started: Instant::now(),
            skew: AtomicU64::new(0),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp(
            self.genesis
                .saturating_add(self.started.elapsed().as_secs())
                .saturating_add(self.skew.load(Ordering::SeqCst)),
        )
    }

    /// Jump this chain's clock forward without affecting any other chain.
    pub fn advance(&self, secs: u64) {
        self.skew.fetch_add(secs, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct SimEscrow {
    request: LockRequest,
    state: EscrowState,
    revealed: Option<Vec<u8>>,
}

/// In-memory escrow contract and token ledger for one chain.
///
/// Enforces the escrow rules real contracts are assumed to enforce: hash-lock
/// check with the chain's own hash function, time windows against this
/// chain's clock, caller authorization per window, and one escrow per id.
/// Transactions execute at submission; confirmations can be stalled or
/// transactions dropped to exercise retry paths.
pub struct SimulatedLedger {
    spec: ChainSpec,
    clock: SimClock,
    confirmation_delay: Duration,
    escrows: DashMap<OrderId, SimEscrow>,
    /// (token, owner) -> balance
    balances: DashMap<(Address, Address), Amount>,
    /// (token, owner, spender) -> allowance
    allowances: DashMap<(Address, Address, Address), Amount>,
    /// tx hash -> receipt; `None` for dropped transactions.
    txs: DashMap<String, Option<Receipt>>,
    stalled: DashMap<TxKind, u32>,
    dropped: DashMap<TxKind, u32>,
    submissions: DashMap<TxKind, u64>,
    reject_approvals: AtomicBool,
    tx_counter: AtomicU64,
}

impl SimulatedLedger {
    pub fn new(spec: ChainSpec, genesis: Timestamp) -> Self {
        Self {
            spec,
            clock: SimClock::new(genesis),
            confirmation_delay: Duration::from_millis(500),
            escrows: DashMap::new(),
            balances: DashMap::new(),
            allowances: DashMap::new(),
            txs: DashMap::new(),
            stalled: DashMap::new(),
            dropped: DashMap::new(),
            submissions: DashMap::new(),
            reject_approvals: AtomicBool::new(false),
            tx_counter: AtomicU64::new(0),
        }
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(secs);
        tracing::debug!(chain = %self.spec.name, secs, now = %self.clock.now(), "clock advanced");
    }

    /// Mint `amount` of `token` to `owner`.
    pub fn fund(&self, token: &Address, owner: &Address, amount: Amount) {
        *self
            .balances
            .entry((token.clone(), owner.clone()))
            .or_insert(0) += amount;
    }

    pub fn balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.balances
            .get(&(token.clone(), owner.clone()))
            .map(|b| *b)
            .unwrap_or(0)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(token.clone(), owner.clone(), spender.clone()))
            .map(|a| *a)
            .unwrap_or(0)
    }

    pub fn escrow_state(&self, id: &OrderId) -> EscrowState {
        self.escrows
            .get(id)
            .map(|e| e.state)
            .unwrap_or(EscrowState::Uncommitted)
    }

    /// The next `count` confirmations of `kind` time out even though the tx executes.
    pub fn stall_confirmations(&self, kind: TxKind, count: u32) {
        *self.stalled.entry(kind).or_insert(0) += count;
    }

    /// The next `count` submissions of `kind` are accepted but never execute.
    pub fn drop_transactions(&self, kind: TxKind, count: u32) {
        *self.dropped.entry(kind).or_insert(0) += count;
    }

    /// Make every subsequent approval fail.
    pub fn reject_approvals(&self, reject: bool) {
        self.reject_approvals.store(reject, Ordering::SeqCst);
    }

    /// Number of transactions of `kind` submitted so far.
    pub fn submission_count(&self, kind: TxKind) -> u64 {
        self.submissions.get(&kind).map(|c| *c).unwrap_or(0)
    }

    fn take_fault(map: &DashMap<TxKind, u32>, kind: TxKind) -> bool {
        match map.get_mut(&kind) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn credit(&self, token: &Address, owner: &Address, amount: Amount) {
        *self
            .balances
            .entry((token.clone(), owner.clone()))
            .or_insert(0) += amount;
    }

    fn execute(&self, tx: &EscrowTx, now: Timestamp) -> TxStatus {
        match tx {
            EscrowTx::Lock(req) => self.execute_lock(req),
            EscrowTx::Claim {
                escrow_id,
                secret,
                caller,
            } => self.execute_claim(escrow_id, secret, caller, now),
            EscrowTx::Cancel { escrow_id, caller } => self.execute_cancel(escrow_id, caller, now),
        }
    }

    fn execute_lock(&self, req: &LockRequest) -> TxStatus {
        let entry = match self.escrows.entry(req.escrow_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return TxStatus::Reverted(RejectReason::DuplicateEscrow)
            }
            dashmap::mapref::entry::Entry::Vacant(v) => v,
        };

        let balance_key = (req.token.clone(), req.depositor.clone());
        let allowance_key = (
            req.token.clone(),
            req.depositor.clone(),
            self.spec.escrow_contract.clone(),
        );
        {
            let mut balance = self.balances.entry(balance_key).or_insert(0);
            if *balance < req.amount {
                return TxStatus::Reverted(RejectReason::InsufficientBalance);
            }
            let mut allowance = self.allowances.entry(allowance_key).or_insert(0);
            if *allowance < req.amount {
                return TxStatus::Reverted(RejectReason::InsufficientAllowance);
            }
            *balance -= req.amount;
            *allowance -= req.amount;
        }

        entry.insert(SimEscrow {
            request: req.clone(),
            state: EscrowState::Locked,
            revealed: None,
        });
        TxStatus::Success
    }

    fn execute_claim(
        &self,
        escrow_id: &OrderId,
        secret: &[u8],
        caller: &Address,
        now: Timestamp,
    ) -> TxStatus {
        let mut escrow = match self.escrows.get_mut(escrow_id) {
            Some(e) => e,
            None => return TxStatus::Reverted(RejectReason::UnknownEscrow),
        };
        if escrow.state != EscrowState::Locked {
            return TxStatus::Reverted(RejectReason::AlreadySettled);
        }

        let req = &escrow.request;
        let window = &req.window;
        if now < window.withdrawal {
            return TxStatus::Reverted(RejectReason::TooEarly);
        }
        if now >= window.cancellation {
            return TxStatus::Reverted(RejectReason::WindowClosed);
        }
        if now < window.public_withdrawal && *caller != req.maker && *caller != req.taker {
            return TxStatus::Reverted(RejectReason::NotAuthorized);
        }
        if !crossloc_crypto::matches_lock(self.spec.hash.algorithm, secret, &req.hash_lock) {
            return TxStatus::Reverted(RejectReason::WrongSecret);
        }

        let (token, beneficiary, amount) =
            (req.token.clone(), req.beneficiary.clone(), req.amount);
        escrow.state = EscrowState::Claimed;
        escrow.revealed = Some(secret.to_vec());
        drop(escrow);
        self.credit(&token, &beneficiary, amount);
        TxStatus::Success
    }

    fn execute_cancel(&self, escrow_id: &OrderId, caller: &Address, now: Timestamp) -> TxStatus {
        let mut escrow = match self.escrows.get_mut(escrow_id) {
            Some(e) => e,
            None => return TxStatus::Reverted(RejectReason::UnknownEscrow),
        };
        if escrow.state != EscrowState::Locked {
            return TxStatus::Reverted(RejectReason::AlreadySettled);
        }

        let req = &escrow.request;
        let window = &req.window;
        if now < window.cancellation {
            return TxStatus::Reverted(RejectReason::TooEarly);
        }
        let public = window.public_cancellation.is_some_and(|pc| now >= pc);
        if !public && *caller != req.taker && *caller != req.depositor {
            return TxStatus::Reverted(RejectReason::NotAuthorized);
        }

        let (token, depositor, amount) = (req.token.clone(), req.depositor.clone(), req.amount);
        escrow.state = EscrowState::Cancelled;
        drop(escrow);
        self.credit(&token, &depositor, amount);
        TxStatus::Success
    }

    fn check_chain(&self, escrow: &EscrowRef) -> Result<(), EscrowError> {
        if escrow.chain != self.spec.id {
            return Err(EscrowError::Ledger(format!(
                "escrow {} queried on chain {}",
                escrow, self.spec.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    fn chain_id(&self) -> ChainId {
        self.spec.id
    }

    async fn current_time(&self) -> Result<Timestamp, EscrowError> {
        Ok(self.clock.now())
    }

    async fn submit(&self, tx: EscrowTx) -> Result<TxHandle, EscrowError> {
        let kind = tx.kind();
        *self.submissions.entry(kind).or_insert(0) += 1;

        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let handle = TxHandle {
            chain: self.spec.id,
            kind,
            tx_hash: format!("0x{:016x}{:016x}", self.spec.id.0, n),
        };

        if Self::take_fault(&self.dropped, kind) {
            tracing::debug!(chain = %self.spec.name, tx = %handle.tx_hash, %kind, "transaction dropped");
            self.txs.insert(handle.tx_hash.clone(), None);
            return Ok(handle);
        }

        let now = self.clock.now();
        let status = self.execute(&tx, now);
        tracing::debug!(
            chain = %self.spec.name,
            tx = %handle.tx_hash,
            %kind,
            escrow = %tx.escrow_id().short(),
            status = ?status,
            "transaction executed"
        );
        self.txs.insert(
            handle.tx_hash.clone(),
            Some(Receipt {
                tx: handle.clone(),
                status,
                block_time: now,
            }),
        );
        Ok(handle)
    }

    async fn await_confirmation(
        &self,
        handle: &TxHandle,
        timeout: Duration,
    ) -> Result<Receipt, EscrowError> {
        let receipt = self
            .txs
            .get(&handle.tx_hash)
            .map(|r| r.clone())
            .ok_or_else(|| EscrowError::UnknownTransaction(handle.tx_hash.clone()))?;

        let stalled = Self::take_fault(&self.stalled, handle.kind);
        match receipt {
            Some(receipt) if !stalled && self.confirmation_delay <= timeout => {
                tokio::time::sleep(self.confirmation_delay).await;
                Ok(receipt)
            }
            _ => {
                tokio::time::sleep(timeout).await;
                Err(EscrowError::ConfirmationTimeout(handle.kind))
            }
        }
    }

    async fn query_escrow_state(&self, escrow: &EscrowRef) -> Result<EscrowState, EscrowError> {
        self.check_chain(escrow)?;
        Ok(self.escrow_state(&escrow.escrow_id))
    }

    async fn revealed_secret(&self, escrow: &EscrowRef) -> Result<Option<Vec<u8>>, EscrowError> {
        self.check_chain(escrow)?;
        Ok(self
            .escrows
            .get(&escrow.escrow_id)
            .and_then(|e| e.revealed.clone()))
    }
}

#[async_trait]
impl TokenGateway for SimulatedLedger {
    async fn ensure_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), EscrowError> {
        let available = self.balance_of(token, owner);
        if available < amount {
            return Err(EscrowError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        if self.reject_approvals.load(Ordering::SeqCst) {
            return Err(EscrowError::ApprovalFailed(format!(
                "{} rejected approval of {} for {}",
                self.spec.name, token, spender
            )));
        }
        // Approvals are per swap, so they add up across concurrent swaps.
        *self
            .allowances
            .entry((token.clone(), owner.clone(), spender.clone()))
            .or_insert(0) += amount;
        Ok(())
    }
}
