//! BIP-32 secp256k1 hierarchical deterministic key derivation (NIP-06).
//!
//! # Derivation path format
//!
//! ```text
//! m/44'/1237'/<account>'/0/0
//! ```
//!
//! Hardened components are suffixed with `'` or `h`. Unlike the Ed25519
//! scheme, secp256k1 supports non-hardened children, and the standard Nostr
//! path ends in two of them.
//!
//! Reference: <https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki>

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use secp256k1::{Scalar, SecretKey};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::mnemonic::Seed;
use crate::nostr::error::{NostrError, Result};
use crate::nostr::keys::{Keypair, SECP};

/// HMAC-SHA512 type alias used throughout BIP-32.
type HmacSha512 = Hmac<Sha512>;

/// SLIP-44 coin type registered for Nostr.
pub const NOSTR_COIN_TYPE: u32 = 1237;

/// BIP-44 purpose.
pub const BIP44_PURPOSE: u32 = 44;

/// The hardened index offset (0x80000000) per BIP-32.
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// HMAC key for master key generation per BIP-32.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// One step of a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildNumber {
    index: u32,
    hardened: bool,
}

impl ChildNumber {
    /// A hardened child. `index` must be below 2^31.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidDerivation`] if `index` is out of range.
    pub fn hardened(index: u32) -> Result<Self> {
        Self::new(index, true)
    }

    /// A non-hardened child. `index` must be below 2^31.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidDerivation`] if `index` is out of range.
    pub fn normal(index: u32) -> Result<Self> {
        Self::new(index, false)
    }

    fn new(index: u32, hardened: bool) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(NostrError::InvalidDerivation(format!(
                "index {index} exceeds maximum ({})",
                HARDENED_OFFSET - 1
            )));
        }
        Ok(Self { index, hardened })
    }

    /// Index without the hardened offset.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Whether this step is hardened.
    #[must_use]
    pub const fn is_hardened(self) -> bool {
        self.hardened
    }

    /// The following index of the same type, used to skip invalid children.
    fn next(self) -> Result<Self> {
        Self::new(self.index.saturating_add(1), self.hardened)
    }

    const fn to_raw(self) -> u32 {
        if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// An ordered list of child steps starting at the master key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// The NIP-06 path `m/44'/1237'/<account>'/0/0`.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidDerivation`] if `account` is 2^31 or above.
    pub fn nostr(account: u32) -> Result<Self> {
        Ok(Self(vec![
            ChildNumber::hardened(BIP44_PURPOSE)?,
            ChildNumber::hardened(NOSTR_COIN_TYPE)?,
            ChildNumber::hardened(account)?,
            ChildNumber::normal(0)?,
            ChildNumber::normal(0)?,
        ]))
    }

    /// The steps of this path.
    #[must_use]
    pub fn children(&self) -> &[ChildNumber] {
        &self.0
    }
}

impl FromStr for DerivationPath {
    type Err = NostrError;

    /// Parses paths of the form `m/44'/1237'/0'/0/0`.
    fn from_str(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        let Some(components) = trimmed.strip_prefix("m/") else {
            return Err(NostrError::InvalidDerivation(format!(
                "derivation path must start with 'm/', got '{trimmed}'"
            )));
        };

        if components.is_empty() {
            return Err(NostrError::InvalidDerivation(
                "derivation path must have at least one component".to_string(),
            ));
        }

        let mut children = Vec::new();
        for part in components.split('/') {
            let part = part.trim();
            let (digits, hardened) = match part
                .strip_suffix('\'')
                .or_else(|| part.strip_suffix('h'))
            {
                Some(digits) => (digits, true),
                None => (part, false),
            };

            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(NostrError::InvalidDerivation(format!(
                    "invalid component '{part}' in derivation path"
                )));
            }

            let index: u32 = digits.parse().map_err(|_| {
                NostrError::InvalidDerivation(format!("index '{digits}' is out of range"))
            })?;
            children.push(ChildNumber::new(index, hardened)?);
        }

        Ok(Self(children))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for child in &self.0 {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}

/// Derives the Nostr keypair for `account` (path `m/44'/1237'/<account>'/0/0`).
///
/// # Errors
///
/// Returns [`NostrError::InvalidDerivation`] if `account` is 2^31 or above
/// or the seed yields an invalid master key.
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::identity::{derive_keypair, Mnemonic};
///
/// let mnemonic = Mnemonic::parse(
///     "leader monkey parrot ring guide accident before fence cannon height naive bean",
/// )
/// .unwrap();
/// let keypair = derive_keypair(&mnemonic.to_seed(""), 0).unwrap();
/// assert_eq!(
///     keypair.public_key().to_hex(),
///     "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da6eec3ca5cd917"
/// );
/// ```
pub fn derive_keypair(seed: &Seed, account: u32) -> Result<Keypair> {
    derive_keypair_at(seed, &DerivationPath::nostr(account)?)
}

/// Derives the keypair at an arbitrary path.
///
/// # Process (BIP-32)
///
/// 1. Master key: `HMAC-SHA512(key="Bitcoin seed", data=seed)`.
/// 2. For each child `i`:
///    - hardened: `HMAC-SHA512(chain_code, 0x00 ‖ k ‖ ser32(i + 2^31))`
///    - normal: `HMAC-SHA512(chain_code, serP(k·G) ‖ ser32(i))`
///    - child key = `IL + k (mod n)`, chain code = `IR`
/// 3. If `IL ≥ n` or the child key is zero, the index is skipped and the
///    next one is used.
///
/// # Errors
///
/// Returns [`NostrError::InvalidDerivation`] if the master key is invalid or
/// skipping runs past the last index.
pub fn derive_keypair_at(seed: &Seed, path: &DerivationPath) -> Result<Keypair> {
    let mut node = ExtendedKey::master(seed)?;
    for &child in path.children() {
        node = node.derive_child(child)?;
    }
    Keypair::from_secret_bytes(node.secret)
}

/// A private key with its chain code.
#[derive(Zeroize, ZeroizeOnDrop)]
struct ExtendedKey {
    secret: [u8; 32],
    chain_code: [u8; 32],
}

impl ExtendedKey {
    fn master(seed: &Seed) -> Result<Self> {
        let i = Zeroizing::new(hmac_sha512(MASTER_HMAC_KEY, seed.as_bytes())?);
        let node = Self::from_hmac_output(&i);

        if SecretKey::from_slice(&node.secret).is_err() {
            return Err(NostrError::InvalidDerivation(
                "seed yields an invalid master key".to_string(),
            ));
        }
        Ok(node)
    }

    fn from_hmac_output(i: &[u8; 64]) -> Self {
        let mut node = Self {
            secret: [0u8; 32],
            chain_code: [0u8; 32],
        };
        node.secret.copy_from_slice(&i[..32]);
        node.chain_code.copy_from_slice(&i[32..]);
        node
    }

    fn derive_child(&self, child: ChildNumber) -> Result<Self> {
        let mut child = child;
        loop {
            if let Some(node) = self.try_derive_child(child)? {
                return Ok(node);
            }
            tracing::warn!(
                index = child.index(),
                hardened = child.is_hardened(),
                "skipping invalid BIP-32 child index"
            );
            child = child.next()?;
        }
    }

    /// Returns `None` when this index yields an invalid key.
    fn try_derive_child(&self, child: ChildNumber) -> Result<Option<Self>> {
        let mut parent = SecretKey::from_slice(&self.secret)
            .map_err(|_| NostrError::InvalidDerivation("invalid parent key".to_string()))?;

        // data = (0x00 ‖ k | serP(K)) ‖ ser32(i) = 37 bytes
        let mut data = Zeroizing::new([0u8; 37]);
        if child.is_hardened() {
            data[1..33].copy_from_slice(&self.secret);
        } else {
            let point = secp256k1::PublicKey::from_secret_key(&SECP, &parent);
            data[..33].copy_from_slice(&point.serialize());
        }
        data[33..].copy_from_slice(&child.to_raw().to_be_bytes());

        let i = Zeroizing::new(hmac_sha512(&self.chain_code, &data[..])?);
        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&i[..32]);

        let child_key = Scalar::from_be_bytes(*il)
            .ok()
            .and_then(|tweak| parent.add_tweak(&tweak).ok());
        parent.non_secure_erase();
        let Some(mut child_key) = child_key else {
            return Ok(None);
        };

        let mut node = Self::from_hmac_output(&i);
        node.secret = child_key.secret_bytes();
        child_key.non_secure_erase();
        Ok(Some(node))
    }
}

/// Computes HMAC-SHA512 and returns the 64-byte output.
fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| NostrError::Crypto(format!("HMAC-SHA512 key init failed: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
