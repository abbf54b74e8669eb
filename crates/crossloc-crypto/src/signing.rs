use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use std::fmt;

use crossloc_core::{ChainFamily, SwapOrder};

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

const TYPED_DOMAIN: &[u8] = b"crossloc/typed-order/v1";
const RAW_PREFIX: &[u8] = b"\x19CrossLoc Signed Message:\n32";

/// How the maker's consent to an order is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    /// Structured digest bound to the source chain id.
    Typed,
    /// Prefixed personal-message style signature over the order id.
    Raw,
}

impl SignatureScheme {
    /// Scheme used for orders whose source chain is of `family`.
    pub fn for_family(family: ChainFamily) -> Self {
        match family {
            ChainFamily::Evm => Self::Typed,
            ChainFamily::Stellar | ChainFamily::Starknet => Self::Raw,
        }
    }

    /// Bytes actually signed for `order`.
    pub fn message(&self, order: &SwapOrder) -> Vec<u8> {
        match self {
            Self::Typed => {
                let mut payload = Vec::with_capacity(TYPED_DOMAIN.len() + 8 + 32);
                payload.extend_from_slice(TYPED_DOMAIN);
                payload.extend_from_slice(&order.src_chain.id.0.to_be_bytes());
                payload.extend_from_slice(order.id.as_bytes());
                blake3::hash(&payload).as_bytes().to_vec()
            }
            Self::Raw => {
                let mut payload = Vec::with_capacity(RAW_PREFIX.len() + 32);
                payload.extend_from_slice(RAW_PREFIX);
                payload.extend_from_slice(order.id.as_bytes());
                payload
            }
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed => write!(f, "typed"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// Maker signature over an order. Off-chain evidence only; escrows enforce
/// authorization themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSignature {
    pub scheme: SignatureScheme,
    /// Hex-encoded Ed25519 public key of the signer.
    pub signer: String,
    /// Hex-encoded 64-byte signature.
    pub signature: String,
}

/// Sign `order` with the scheme its source chain calls for.
pub fn sign_order(order: &SwapOrder, keypair: &KeyPair) -> OrderSignature {
    let scheme = SignatureScheme::for_family(order.src_chain.family);
    let sig = keypair.signing_key().sign(&scheme.message(order));
    OrderSignature {
        scheme,
        signer: keypair.public_key().to_hex(),
        signature: hex::encode(sig.to_bytes()),
    }
}

/// Verify an order signature, including that the order id matches its contents.
pub fn verify_order(order: &SwapOrder, signature: &OrderSignature) -> Result<PublicKey, CryptoError> {
    if !order.verify_id() {
        return Err(CryptoError::OrderIdMismatch);
    }

    let expected = SignatureScheme::for_family(order.src_chain.family);
    if signature.scheme != expected {
        return Err(CryptoError::SchemeMismatch {
            family: order.src_chain.family.to_string(),
            expected: expected.to_string(),
            actual: signature.scheme.to_string(),
        });
    }

    let signer = PublicKey::from_hex(&signature.signer)?;
    let sig_bytes = hex::decode(&signature.signature)
        .map_err(|e| CryptoError::InvalidInput(format!("invalid signature hex: {}", e)))?;
    let sig_arr: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidInput(format!("signature must be 64 bytes, got {}", sig_bytes.len()))
    })?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_arr);

    signer
        .verifying_key()
        .verify(&signature.scheme.message(order), &sig)
        .map_err(|_| CryptoError::SignatureVerificationFailed)?;

    Ok(signer)
}
