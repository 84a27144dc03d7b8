//! Keypair management and BIP-340 Schnorr signatures.
//!
//! A [`Keypair`] owns a secp256k1 secret scalar and its x-only public key.
//! It signs 32-byte digests (event ids) and computes ECDH shared secrets
//! for payload encryption. Secret bytes are zeroized on drop.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use secp256k1::{ecdh, schnorr, Message, Parity, Secp256k1, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::nostr::error::{NostrError, Result};

/// Global secp256k1 context for cryptographic operations.
///
/// Creating a `Secp256k1` context is expensive as it precomputes tables
/// for signing and verification. This shared context is initialized once
/// and reused across all operations.
///
/// # Thread Safety
///
/// The `Secp256k1` context is `Send + Sync`, making it safe to share
/// across threads.
pub static SECP: LazyLock<Secp256k1<secp256k1::All>> = LazyLock::new(Secp256k1::new);

/// Upper bound on rejection-sampling rounds during key generation.
///
/// A uniformly random 32-byte string is out of range with probability
/// below 2^-127, so hitting this bound means the randomness source is broken.
const MAX_GENERATION_ATTEMPTS: usize = 64;

/// A secp256k1 keypair for signing events and deriving shared secrets.
///
/// # Security
///
/// - Secret key bytes are zeroized on drop via `ZeroizeOnDrop`
/// - The secp256k1 keypair is reconstructed from bytes only for the
///   duration of a signing or ECDH operation
/// - `Debug` output never includes secret material
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::Keypair;
///
/// let keypair = Keypair::generate().unwrap();
/// assert_eq!(keypair.public_key().to_hex().len(), 64);
/// ```
#[derive(ZeroizeOnDrop)]
pub struct Keypair {
    /// The secret key bytes (zeroized on drop)
    secret_bytes: [u8; 32],

    /// Cached x-only public key (not sensitive, skip zeroization)
    #[zeroize(skip)]
    public_key: PublicKey,
}

impl Keypair {
    /// Generates a new random keypair from the operating system's CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::Crypto`] if the randomness source is unavailable.
    pub fn generate() -> Result<Self> {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generates a new keypair from the supplied randomness source.
    ///
    /// Candidates outside `[1, n-1]` are rejected and redrawn, so the
    /// resulting scalar is uniform over the valid range.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::Crypto`] if the randomness source fails.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut candidate = Zeroizing::new([0u8; 32]);

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            rng.try_fill_bytes(&mut candidate[..])
                .map_err(|e| NostrError::Crypto(format!("randomness source unavailable: {e}")))?;

            if let Ok(keypair) = Self::from_secret_slice(&candidate) {
                return Ok(keypair);
            }
        }

        Err(NostrError::Crypto(
            "randomness source produced no valid scalar".to_string(),
        ))
    }

    /// Creates a keypair from raw secret key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidKey`] if the bytes are zero or not below
    /// the curve order.
    pub fn from_secret_bytes(secret_bytes: [u8; 32]) -> Result<Self> {
        let secret = Zeroizing::new(secret_bytes);
        Self::from_secret_slice(&secret)
    }

    /// Imports a keypair from a 64-character hex private key.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidKey`] if the input is not exactly 64 hex
    /// characters or does not encode a scalar in `[1, n-1]`.
    ///
    /// # Example
    ///
    /// ```
    /// use haven_protocol::nostr::Keypair;
    ///
    /// let hex = "0000000000000000000000000000000000000000000000000000000000000001";
    /// let keypair = Keypair::from_secret_hex(hex).unwrap();
    /// assert_eq!(
    ///     keypair.public_key().to_hex(),
    ///     "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
    /// );
    /// ```
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        if secret_hex.len() != 64 {
            return Err(NostrError::InvalidKey(
                "secret key must be 64 hex characters".to_string(),
            ));
        }

        let mut secret = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(secret_hex, &mut secret[..])
            .map_err(|_| NostrError::InvalidKey("secret key is not valid hex".to_string()))?;

        Self::from_secret_slice(&secret)
    }

    fn from_secret_slice(secret: &[u8; 32]) -> Result<Self> {
        let mut secret_key = SecretKey::from_slice(secret)
            .map_err(|_| NostrError::InvalidKey("secret scalar out of range".to_string()))?;
        let mut keypair = secp256k1::Keypair::from_secret_key(&SECP, &secret_key);
        let (x_only, _parity) = keypair.x_only_public_key();
        keypair.non_secure_erase();
        secret_key.non_secure_erase();

        Ok(Self {
            secret_bytes: *secret,
            public_key: PublicKey(x_only.serialize()),
        })
    }

    /// Returns the x-only public key.
    #[must_use]
    pub const fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Exports the secret key as lowercase hex.
    ///
    /// # Security Warning
    ///
    /// This exposes the secret key. Only use for user-initiated backup.
    /// The returned string is zeroized when dropped.
    #[must_use]
    pub fn export_secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret_bytes))
    }

    /// Signs a 32-byte message hash using a BIP-340 Schnorr signature.
    ///
    /// Auxiliary randomness is drawn from the operating system's CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::Crypto`] if the randomness source fails.
    pub fn sign(&self, message_hash: &[u8; 32]) -> Result<Signature> {
        self.sign_with_rng(message_hash, &mut OsRng)
    }

    /// Signs a 32-byte message hash, drawing auxiliary randomness from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::Crypto`] if the randomness source fails.
    pub fn sign_with_rng<R: RngCore + CryptoRng>(
        &self,
        message_hash: &[u8; 32],
        rng: &mut R,
    ) -> Result<Signature> {
        let mut aux_rand = Zeroizing::new([0u8; 32]);
        rng.try_fill_bytes(&mut aux_rand[..])
            .map_err(|e| NostrError::Crypto(format!("randomness source unavailable: {e}")))?;

        let mut secret_key = self.secret_key()?;
        let mut keypair = secp256k1::Keypair::from_secret_key(&SECP, &secret_key);
        secret_key.non_secure_erase();
        let message = Message::from_digest(*message_hash);
        let signature = SECP.sign_schnorr_with_aux_rand(&message, &keypair, &aux_rand);
        keypair.non_secure_erase();

        Ok(Signature(signature.serialize()))
    }

    /// Computes the ECDH shared secret with another party's public key.
    ///
    /// Returns the x-coordinate of `secret · P`, unhashed.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidKey`] if `public_key` is not on the curve.
    pub fn shared_secret(&self, public_key: &PublicKey) -> Result<Zeroizing<[u8; 32]>> {
        let point = public_key.to_point()?;
        let mut secret_key = self.secret_key()?;
        let xy = Zeroizing::new(ecdh::shared_secret_point(&point, &secret_key));
        secret_key.non_secure_erase();

        let mut shared_x = Zeroizing::new([0u8; 32]);
        shared_x.copy_from_slice(&xy[..32]);
        Ok(shared_x)
    }

    /// Returns the secret scalar as a `secp256k1` key.
    ///
    /// Callers erase it with `non_secure_erase` once done.
    fn secret_key(&self) -> Result<SecretKey> {
        SecretKey::from_slice(&self.secret_bytes)
            .map_err(|_| NostrError::InvalidKey("stored secret is invalid".to_string()))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret key
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key.to_hex())
            .finish()
    }
}

/// Verifies a BIP-340 signature over a 32-byte message.
///
/// Returns `false` for malformed keys or signatures instead of erroring.
#[must_use]
pub fn verify_signature(
    public_key: &PublicKey,
    message_hash: &[u8; 32],
    signature: &Signature,
) -> bool {
    let Ok(x_only) = public_key.to_x_only() else {
        return false;
    };
    let Ok(signature) = schnorr::Signature::from_slice(&signature.0) else {
        return false;
    };

    SECP.verify_schnorr(&signature, &Message::from_digest(*message_hash), &x_only)
        .is_ok()
}

/// Decodes a hex string into a fixed-size byte array.
pub(crate) fn decode_hex_array<const N: usize>(input: &str) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(input, &mut out)?;
    Ok(out)
}

/// A 32-byte x-only public key.
///
/// Any 32 bytes can be held here so that events from the wire can be
/// represented and hashed; curve validity is checked when the key is used
/// for verification or ECDH.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Wraps raw x-only key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a 64-character hex public key.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidKey`] if the input is not 64 hex characters.
    pub fn from_hex(input: &str) -> Result<Self> {
        decode_hex_array(input)
            .map(Self)
            .map_err(|_| NostrError::InvalidKey("public key must be 64 hex characters".to_string()))
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the key as lowercase hex, the form used in event JSON.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns `true` if these bytes are the x-coordinate of a curve point.
    #[must_use]
    pub fn is_valid_point(&self) -> bool {
        self.to_x_only().is_ok()
    }

    pub(crate) fn to_x_only(self) -> Result<XOnlyPublicKey> {
        XOnlyPublicKey::from_slice(&self.0)
            .map_err(|_| NostrError::InvalidKey("public key is not a curve point".to_string()))
    }

    /// Lifts the x-only key to the even-y point (BIP-340 convention).
    pub(crate) fn to_point(self) -> Result<secp256k1::PublicKey> {
        Ok(self.to_x_only()?.public_key(Parity::Even))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = NostrError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// A 64-byte BIP-340 Schnorr signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    /// Wraps raw signature bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Parses a 128-character hex signature.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::HexError`] if the input is not 128 hex characters.
    pub fn from_hex(input: &str) -> Result<Self> {
        decode_hex_array(input).map(Self)
    }

    /// Returns the raw signature bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Returns the signature as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
