use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use stellar_strkey::Strkey;

use crate::error::CoreError;

/// Numeric chain identifier (EVM chain id, or a configured id for non-EVM chains).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Family of a chain. Decides address format, default hash and signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Stellar,
    Starknet,
}

impl ChainFamily {
    /// The hash-lock construction escrows of this family verify against.
    pub fn default_hash_spec(&self) -> HashSpec {
        match self {
            Self::Evm | Self::Stellar => HashSpec {
                algorithm: HashAlgorithm::Keccak256,
                secret_bits: 256,
            },
            // The secret must fit in one field element.
            Self::Starknet => HashSpec {
                algorithm: HashAlgorithm::Poseidon,
                secret_bits: 251,
            },
        }
    }

    /// Check that `address` is well-formed for this family.
    pub fn validate_address(&self, address: &str) -> Result<(), CoreError> {
        let ok = match self {
            Self::Evm => is_evm_address(address),
            Self::Stellar => matches!(
                Strkey::from_string(address),
                Ok(Strkey::PublicKeyEd25519(_)) | Ok(Strkey::Contract(_))
            ),
            Self::Starknet => is_felt_address(address),
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::InvalidAddress {
                family: self.to_string(),
                address: address.to_string(),
            })
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm => write!(f, "evm"),
            Self::Stellar => write!(f, "stellar"),
            Self::Starknet => write!(f, "starknet"),
        }
    }
}

/// 20-byte hex address. Mixed-case input must carry its EIP-55 checksum.
fn is_evm_address(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true;
    }
    digits == eip55_checksum(digits)
}

/// EIP-55 casing of 40 hex digits.
pub fn eip55_checksum(digits: &str) -> String {
    let lower = digits.to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());
    lower
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// `0x`-prefixed field element below 2^251, leading zeros optional.
fn is_felt_address(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    if digits.is_empty() || digits.len() > 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let significant = digits.trim_start_matches('0');
    match significant.len() {
        0..=62 => true,
        63 => significant.as_bytes()[0] < b'8',
        _ => false,
    }
}

/// Hash function an escrow uses to check a revealed secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Keccak256,
    Sha256,
    Blake3,
    /// Poseidon over the secret read as one field element.
    Poseidon,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keccak256 => write!(f, "keccak256"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
            Self::Poseidon => write!(f, "poseidon"),
        }
    }
}

/// Per-chain hash-lock requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashSpec {
    /// Hash function applied to the secret.
    pub algorithm: HashAlgorithm,
    /// Largest secret the chain can carry safely, in bits (at most 256).
    pub secret_bits: u16,
}

/// Static description of one chain an orchestrator is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub id: ChainId,
    pub name: String,
    pub family: ChainFamily,
    pub hash: HashSpec,
    /// Escrow contract that receives allowances and lock transactions.
    pub escrow_contract: Address,
}

impl ChainSpec {
    /// Create a chain spec with the family's default hash requirements.
    pub fn new(id: u64, name: &str, family: ChainFamily, escrow_contract: &str) -> Self {
        Self {
            id: ChainId(id),
            name: name.to_string(),
            family,
            hash: family.default_hash_spec(),
            escrow_contract: Address::new(escrow_contract),
        }
    }

    /// Override the hash requirements.
    pub fn with_hash(mut self, hash: HashSpec) -> Self {
        self.hash = hash;
        self
    }
}

/// A chain address, kept in its native textual form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(address: &str) -> Self {
        Self(address.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A party's addresses on the two chains of a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyAddresses {
    pub src: Address,
    pub dst: Address,
}

impl PartyAddresses {
    pub fn new(src: &str, dst: &str) -> Self {
        Self {
            src: Address::new(src),
            dst: Address::new(dst),
        }
    }
}

/// Token amount in the token's smallest unit.
pub type Amount = u128;

/// Chain time in seconds since the UNIX epoch, as reported by one chain.
///
/// Timestamps from different chains must never be compared with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn plus(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds from `self` until `later`, zero if `later` has passed.
    pub fn until(&self, later: Timestamp) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-byte hash committed in an escrow; a claim must supply its preimage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashLock(pub [u8; 32]);

impl HashLock {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for HashLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Which side of the swap a leg is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    Source,
    Destination,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "src"),
            Self::Destination => write!(f, "dst"),
        }
    }
}

/// Why a swap ended in `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Operator or caller requested abort before the secret was public.
    Aborted,
    /// Token gateway refused the allowance (balance or approval).
    AllowanceFailed(String),
    /// A lock transaction was rejected by the chain.
    LockRejected(String),
    /// A lock was submitted but its confirmation never arrived.
    LockUnconfirmed,
    /// The source cancellation window opened before the destination was locked.
    SrcWindowElapsed,
    /// Too little source time remained to lock the destination safely.
    InsufficientTimeBudget,
    /// The maker never revealed before the destination cancellation window.
    SecretWithheld,
    /// The secret was lost (e.g. restart) before it was revealed.
    SecretUnavailable,
    /// The destination claim was rejected for a non-retryable reason.
    ClaimRejected(String),
    /// The source claim window closed before the resolver could claim.
    ClaimWindowMissed,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted => write!(f, "aborted"),
            Self::AllowanceFailed(e) => write!(f, "allowance failed: {}", e),
            Self::LockRejected(e) => write!(f, "lock rejected: {}", e),
            Self::LockUnconfirmed => write!(f, "lock unconfirmed"),
            Self::SrcWindowElapsed => write!(f, "source window elapsed"),
            Self::InsufficientTimeBudget => write!(f, "insufficient time budget"),
            Self::SecretWithheld => write!(f, "secret withheld"),
            Self::SecretUnavailable => write!(f, "secret unavailable"),
            Self::ClaimRejected(e) => write!(f, "claim rejected: {}", e),
            Self::ClaimWindowMissed => write!(f, "claim window missed"),
        }
    }
}
