/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("insufficient entropy: {0}")]
    InsufficientEntropy(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("order id does not match order contents")]
    OrderIdMismatch,

    #[error("signature scheme {actual} not accepted for {family} orders (expected {expected})")]
    SchemeMismatch {
        family: String,
        expected: String,
        actual: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
