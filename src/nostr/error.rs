//! Error types for Nostr operations.

use thiserror::Error;

/// Errors that can occur while building, signing, encrypting, deriving or
/// mining Nostr events.
///
/// No variant ever carries private scalars, plaintexts, seeds or shared
/// secrets.
#[derive(Error, Debug)]
pub enum NostrError {
    /// Key material is malformed or out of range.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The signing key does not match the event's declared author.
    #[error("Signing key does not match event pubkey")]
    KeyMismatch,

    /// Invalid event structure or content.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Event signature verification failed.
    #[error("Invalid event signature")]
    InvalidSignature,

    /// Payload decryption failed.
    ///
    /// Covers bad version, bad length, MAC mismatch, bad padding and bad
    /// UTF-8 without saying which.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Plaintext is empty or longer than the payload format allows.
    #[error("Invalid plaintext length: {0} bytes")]
    InvalidPlaintextLength(usize),

    /// Mnemonic, seed or path derivation failed.
    #[error("Derivation failed: {0}")]
    InvalidDerivation(String),

    /// Mining deadline elapsed before the target difficulty was reached.
    #[error("Mining deadline exceeded")]
    MiningTimeout,

    /// Mining was cancelled by the caller.
    #[error("Mining cancelled")]
    MiningCancelled,

    /// A caller-supplied argument is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The randomness source failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Hex encoding/decoding error.
    #[error("Hex encoding error: {0}")]
    HexError(String),

    /// A background task failed to complete.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for Nostr operations.
pub type Result<T> = std::result::Result<T, NostrError>;

impl From<hex::FromHexError> for NostrError {
    fn from(e: hex::FromHexError) -> Self {
        Self::HexError(e.to_string())
    }
}
