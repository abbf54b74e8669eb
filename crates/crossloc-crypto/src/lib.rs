pub mod error;
pub mod hashing;
pub mod keys;
pub mod secret;
pub mod signing;

pub use error::CryptoError;
pub use hashing::{digest, hash_lock, matches_lock};
pub use keys::{KeyPair, PublicKey};
pub use secret::{generate, Secret};
pub use signing::{sign_order, verify_order, OrderSignature, SignatureScheme};
