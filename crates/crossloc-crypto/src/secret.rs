//! Swap secrets and their per-chain hash-locks.

use std::collections::BTreeMap;
use std::fmt;

use crossloc_core::{ChainId, HashLock, HashSpec};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::hashing;

/// Minimum usable entropy after masking.
pub const MIN_SECRET_BITS: u16 = 128;

/// Width of every secret on the wire.
pub const SECRET_LEN: usize = 32;

/// A swap secret (hash-lock preimage), big-endian, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    bytes: [u8; SECRET_LEN],
}

impl Secret {
    /// Wrap a preimage observed on chain.
    pub fn from_revealed(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SECRET_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: SECRET_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SECRET_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// The raw preimage. Only claim transactions should need this.
    pub fn expose(&self) -> &[u8; SECRET_LEN] {
        &self.bytes
    }

    /// Hash-lock of this secret under a chain's hash spec.
    pub fn hash_lock(&self, spec: &HashSpec) -> HashLock {
        hashing::hash_lock(spec.algorithm, &self.bytes)
    }

    /// Whether this secret opens `lock` on a chain using `spec`.
    pub fn opens(&self, spec: &HashSpec, lock: &HashLock) -> bool {
        hashing::matches_lock(spec.algorithm, &self.bytes, lock)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<redacted>)")
    }
}

/// Draw a fresh secret that fits every chain in `specs` and derive each chain's hash-lock.
///
/// The secret is masked to the tightest `secret_bits` among the chains so the
/// same preimage is acceptable everywhere; each lock is then computed with
/// that chain's own hash function.
pub fn generate(
    specs: &[(ChainId, HashSpec)],
) -> Result<(Secret, BTreeMap<ChainId, HashLock>), CryptoError> {
    generate_with(&mut OsRng, specs)
}

/// [`generate`] with a caller-supplied RNG.
pub fn generate_with<R: RngCore>(
    rng: &mut R,
    specs: &[(ChainId, HashSpec)],
) -> Result<(Secret, BTreeMap<ChainId, HashLock>), CryptoError> {
    let bits = specs
        .iter()
        .map(|(_, spec)| spec.secret_bits)
        .min()
        .ok_or_else(|| CryptoError::InvalidInput("no chain hash specs supplied".into()))?;

    if specs.iter().any(|(_, spec)| spec.secret_bits > 256) {
        return Err(CryptoError::InvalidInput(
            "secret_bits cannot exceed 256".into(),
        ));
    }
    if bits < MIN_SECRET_BITS {
        return Err(CryptoError::InsufficientEntropy(format!(
            "chains allow only {} secret bits, need at least {}",
            bits, MIN_SECRET_BITS
        )));
    }

    let mut secret = Secret {
        bytes: [0u8; SECRET_LEN],
    };
    rng.try_fill_bytes(&mut secret.bytes)
        .map_err(|e| CryptoError::InsufficientEntropy(format!("rng failure: {}", e)))?;
    mask_high_bits(&mut secret.bytes, bits);

    if secret.bytes.iter().all(|b| *b == 0) {
        return Err(CryptoError::InsufficientEntropy(
            "rng produced an all-zero secret".into(),
        ));
    }

    let locks = specs
        .iter()
        .map(|(chain, spec)| (*chain, secret.hash_lock(spec)))
        .collect();

    tracing::debug!(bits, chains = specs.len(), "swap secret generated");

    Ok((secret, locks))
}

/// Clear the top `256 - bits` bits of a big-endian 32-byte value.
fn mask_high_bits(bytes: &mut [u8; SECRET_LEN], bits: u16) {
    let clear = (256 - bits.min(256)) as usize;
    let full = clear / 8;
    for b in bytes.iter_mut().take(full) {
        *b = 0;
    }
    let rem = clear % 8;
    if rem > 0 && full < SECRET_LEN {
        bytes[full] &= 0xFF >> rem;
    }
}
