use crossloc_core::{HashAlgorithm, HashLock};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use starknet_crypto::{poseidon_hash_many, Felt};

/// 32-byte digest.
pub type Hash = [u8; 32];

/// Hash `data` with the given algorithm.
pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    match algorithm {
        HashAlgorithm::Keccak256 => out.copy_from_slice(&Keccak256::digest(data)),
        HashAlgorithm::Sha256 => out.copy_from_slice(&Sha256::digest(data)),
        HashAlgorithm::Blake3 => out = *blake3::hash(data).as_bytes(),
        HashAlgorithm::Poseidon => {
            let felt = Felt::from_bytes_be_slice(data);
            out = poseidon_hash_many(&[felt]).to_bytes_be();
        }
    }
    out
}

/// Whether `data` is a big-endian value below 2^251, i.e. one field element
/// without reduction.
fn is_field_element(data: &[u8]) -> bool {
    match data.len() {
        0..=31 => true,
        32 => data[0] < 0x08,
        _ => false,
    }
}

/// Hash-lock for a preimage under a chain's hash function.
pub fn hash_lock(algorithm: HashAlgorithm, preimage: &[u8]) -> HashLock {
    HashLock(digest(algorithm, preimage))
}

/// Whether `preimage` opens `lock` under `algorithm`.
pub fn matches_lock(algorithm: HashAlgorithm, preimage: &[u8], lock: &HashLock) -> bool {
    // A reduced preimage would open the lock with a different secret.
    if algorithm == HashAlgorithm::Poseidon && !is_field_element(preimage) {
        return false;
    }
    hash_lock(algorithm, preimage) == *lock
}
