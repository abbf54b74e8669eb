use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::timelock::{LegOffsets, SwapTimelocks};
use crate::types::{Address, Amount, ChainSpec, HashLock, Leg, PartyAddresses};

const ORDER_DOMAIN: &[u8] = b"crossloc/order/v1";

/// Commitment hash of a [`SwapOrder`]. Also the swap id and the escrow id on both chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub [u8; 32]);

impl OrderId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CoreError::ValidationError(format!("order id: {}", e)))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::ValidationError("order id must be 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// An immutable swap order binding both chains.
///
/// Built once by [`OrderBuilder`] before anything is locked. The `id` commits
/// to every other field; [`SwapOrder::verify_id`] recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub id: OrderId,
    pub src_chain: ChainSpec,
    pub dst_chain: ChainSpec,
    pub maker: PartyAddresses,
    pub resolver: PartyAddresses,
    pub src_token: Address,
    pub dst_token: Address,
    /// Amount the maker locks on the source chain.
    pub making_amount: Amount,
    /// Amount the resolver locks on the destination chain.
    pub taking_amount: Amount,
    /// Hash-lock checked by the source escrow (source chain's hash function).
    pub src_hash_lock: HashLock,
    /// Hash-lock checked by the destination escrow (destination chain's hash function).
    pub dst_hash_lock: HashLock,
    pub timelocks: SwapTimelocks,
    pub salt: [u8; 32],
}

impl SwapOrder {
    /// Create a new OrderBuilder.
    pub fn builder() -> OrderBuilder {
        OrderBuilder::default()
    }

    /// Deterministic byte encoding of every field except `id`.
    pub fn commitment_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(512);
        payload.extend_from_slice(ORDER_DOMAIN);
        payload.extend_from_slice(&self.salt);

        for chain in [&self.src_chain, &self.dst_chain] {
            payload.extend_from_slice(&chain.id.0.to_be_bytes());
            put_str(&mut payload, &chain.family.to_string());
            put_str(&mut payload, &chain.hash.algorithm.to_string());
            payload.extend_from_slice(&chain.hash.secret_bits.to_be_bytes());
            put_str(&mut payload, chain.escrow_contract.as_str());
        }

        for party in [&self.maker, &self.resolver] {
            put_str(&mut payload, party.src.as_str());
            put_str(&mut payload, party.dst.as_str());
        }

        put_str(&mut payload, self.src_token.as_str());
        put_str(&mut payload, self.dst_token.as_str());
        payload.extend_from_slice(&self.making_amount.to_be_bytes());
        payload.extend_from_slice(&self.taking_amount.to_be_bytes());
        payload.extend_from_slice(self.src_hash_lock.as_bytes());
        payload.extend_from_slice(self.dst_hash_lock.as_bytes());

        put_offsets(&mut payload, &self.timelocks.src);
        put_offsets(&mut payload, &self.timelocks.dst);
        payload.extend_from_slice(&self.timelocks.resolution_margin.to_be_bytes());

        payload
    }

    /// BLAKE3 of the commitment payload.
    pub fn compute_id(&self) -> OrderId {
        OrderId(*blake3::hash(&self.commitment_payload()).as_bytes())
    }

    /// Check that `id` still commits to the order's fields.
    pub fn verify_id(&self) -> bool {
        self.compute_id() == self.id
    }

    pub fn chain(&self, leg: Leg) -> &ChainSpec {
        match leg {
            Leg::Source => &self.src_chain,
            Leg::Destination => &self.dst_chain,
        }
    }

    pub fn token(&self, leg: Leg) -> &Address {
        match leg {
            Leg::Source => &self.src_token,
            Leg::Destination => &self.dst_token,
        }
    }

    pub fn amount(&self, leg: Leg) -> Amount {
        match leg {
            Leg::Source => self.making_amount,
            Leg::Destination => self.taking_amount,
        }
    }

    pub fn hash_lock(&self, leg: Leg) -> HashLock {
        match leg {
            Leg::Source => self.src_hash_lock,
            Leg::Destination => self.dst_hash_lock,
        }
    }

    pub fn offsets(&self, leg: Leg) -> &LegOffsets {
        match leg {
            Leg::Source => &self.timelocks.src,
            Leg::Destination => &self.timelocks.dst,
        }
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_offsets(buf: &mut Vec<u8>, o: &LegOffsets) {
    buf.extend_from_slice(&o.withdrawal.to_be_bytes());
    buf.extend_from_slice(&o.public_withdrawal.to_be_bytes());
    buf.extend_from_slice(&o.cancellation.to_be_bytes());
    match o.public_cancellation {
        Some(pc) => {
            buf.push(1);
            buf.extend_from_slice(&pc.to_be_bytes());
        }
        None => buf.push(0),
    }
}

/// Builder for [`SwapOrder`].
#[derive(Default)]
pub struct OrderBuilder {
    src_chain: Option<ChainSpec>,
    dst_chain: Option<ChainSpec>,
    maker: Option<PartyAddresses>,
    resolver: Option<PartyAddresses>,
    src_token: Option<Address>,
    dst_token: Option<Address>,
    making_amount: Amount,
    taking_amount: Amount,
    src_hash_lock: Option<HashLock>,
    dst_hash_lock: Option<HashLock>,
    timelocks: Option<SwapTimelocks>,
    salt: Option<[u8; 32]>,
}

impl OrderBuilder {
    pub fn chains(mut self, src: ChainSpec, dst: ChainSpec) -> Self {
        self.src_chain = Some(src);
        self.dst_chain = Some(dst);
        self
    }

    pub fn maker(mut self, maker: PartyAddresses) -> Self {
        self.maker = Some(maker);
        self
    }

    pub fn resolver(mut self, resolver: PartyAddresses) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn tokens(mut self, src: Address, dst: Address) -> Self {
        self.src_token = Some(src);
        self.dst_token = Some(dst);
        self
    }

    pub fn amounts(mut self, making: Amount, taking: Amount) -> Self {
        self.making_amount = making;
        self.taking_amount = taking;
        self
    }

    pub fn hash_locks(mut self, src: HashLock, dst: HashLock) -> Self {
        self.src_hash_lock = Some(src);
        self.dst_hash_lock = Some(dst);
        self
    }

    pub fn timelocks(mut self, timelocks: SwapTimelocks) -> Self {
        self.timelocks = Some(timelocks);
        self
    }

    /// Use a fixed salt instead of a random one.
    pub fn salt(mut self, salt: [u8; 32]) -> Self {
        self.salt = Some(salt);
        self
    }

    /// Validate the parameters and build the order with its commitment id.
    pub fn build(self) -> Result<SwapOrder, CoreError> {
        let src_chain = required(self.src_chain, "src_chain")?;
        let dst_chain = required(self.dst_chain, "dst_chain")?;
        let maker = required(self.maker, "maker")?;
        let resolver = required(self.resolver, "resolver")?;
        let src_token = required(self.src_token, "src_token")?;
        let dst_token = required(self.dst_token, "dst_token")?;
        let src_hash_lock = required(self.src_hash_lock, "src_hash_lock")?;
        let dst_hash_lock = required(self.dst_hash_lock, "dst_hash_lock")?;
        let timelocks = required(self.timelocks, "timelocks")?;

        if self.making_amount == 0 {
            return Err(CoreError::InvalidOrderParams(
                "making_amount must be greater than zero".into(),
            ));
        }
        if self.taking_amount == 0 {
            return Err(CoreError::InvalidOrderParams(
                "taking_amount must be greater than zero".into(),
            ));
        }
        if src_chain.id == dst_chain.id {
            return Err(CoreError::InvalidOrderParams(format!(
                "source and destination chain must differ (both {})",
                src_chain.id
            )));
        }

        let checks = [
            (&src_chain, &maker.src, "maker.src"),
            (&src_chain, &resolver.src, "resolver.src"),
            (&src_chain, &src_token, "src_token"),
            (&src_chain, &src_chain.escrow_contract, "src escrow"),
            (&dst_chain, &maker.dst, "maker.dst"),
            (&dst_chain, &resolver.dst, "resolver.dst"),
            (&dst_chain, &dst_token, "dst_token"),
            (&dst_chain, &dst_chain.escrow_contract, "dst escrow"),
        ];
        for (chain, address, field) in checks {
            chain
                .family
                .validate_address(address.as_str())
                .map_err(|e| CoreError::InvalidOrderParams(format!("{}: {}", field, e)))?;
        }

        timelocks
            .validate()
            .map_err(|e| CoreError::InvalidOrderParams(e.to_string()))?;

        let salt = self.salt.unwrap_or_else(|| {
            let mut salt = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut salt);
            salt
        });

        let mut order = SwapOrder {
            id: OrderId([0u8; 32]),
            src_chain,
            dst_chain,
            maker,
            resolver,
            src_token,
            dst_token,
            making_amount: self.making_amount,
            taking_amount: self.taking_amount,
            src_hash_lock,
            dst_hash_lock,
            timelocks,
            salt,
        };
        order.id = order.compute_id();

        tracing::debug!(
            order = %order.id.short(),
            src = %order.src_chain.name,
            dst = %order.dst_chain.name,
            making = order.making_amount,
            taking = order.taking_amount,
            "order built"
        );

        Ok(order)
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, CoreError> {
    value.ok_or_else(|| CoreError::InvalidOrderParams(format!("missing {}", field)))
}
