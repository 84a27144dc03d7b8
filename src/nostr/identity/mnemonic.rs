//! BIP-39 mnemonic generation, validation, and seed derivation.
//!
//! Word packing, checksums and the PBKDF2 seed come from the `bip39` crate;
//! this module pins the English wordlist, maps its errors into
//! [`NostrError`] without echoing words, and keeps phrases and seeds in
//! zeroizing types.
//!
//! 1. **Generation**: `ENT` bits of entropy plus an `ENT / 32` bit SHA-256
//!    checksum, split into 11-bit word indices.
//! 2. **Validation**: NFKD-normalize, look up every word, check the checksum.
//! 3. **Seed derivation**: PBKDF2-HMAC-SHA512, 2048 rounds,
//!    salt = `"mnemonic" + passphrase`.
//!
//! Reference: <https://github.com/bitcoin/bips/blob/master/bip-0039.mediawiki>

use std::fmt;

use bip39::Language;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::nostr::error::{NostrError, Result};

/// Supported mnemonic lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordCount {
    /// 128 bits of entropy.
    Words12,
    /// 160 bits of entropy.
    Words15,
    /// 192 bits of entropy.
    Words18,
    /// 224 bits of entropy.
    Words21,
    /// 256 bits of entropy.
    Words24,
}

impl WordCount {
    /// Number of words in the phrase.
    #[must_use]
    pub const fn words(self) -> usize {
        match self {
            Self::Words12 => 12,
            Self::Words15 => 15,
            Self::Words18 => 18,
            Self::Words21 => 21,
            Self::Words24 => 24,
        }
    }

    /// Entropy length in bytes.
    #[must_use]
    pub const fn entropy_bytes(self) -> usize {
        self.words() * 4 / 3
    }
}

impl TryFrom<usize> for WordCount {
    type Error = NostrError;

    fn try_from(words: usize) -> Result<Self> {
        match words {
            12 => Ok(Self::Words12),
            15 => Ok(Self::Words15),
            18 => Ok(Self::Words18),
            21 => Ok(Self::Words21),
            24 => Ok(Self::Words24),
            _ => Err(NostrError::InvalidDerivation(format!(
                "mnemonic must have 12, 15, 18, 21 or 24 words, got {words}"
            ))),
        }
    }
}

/// Converts a `bip39` error without ever including the phrase.
fn mnemonic_error(err: bip39::Error) -> NostrError {
    let message = match err {
        bip39::Error::BadWordCount(count) => {
            format!("mnemonic must have 12, 15, 18, 21 or 24 words, got {count}")
        }
        bip39::Error::UnknownWord(index) => {
            format!("word {} is not in the BIP-39 wordlist", index + 1)
        }
        bip39::Error::BadEntropyBitCount(bits) => format!(
            "entropy must be 16, 20, 24, 28 or 32 bytes, got {}",
            bits / 8
        ),
        bip39::Error::InvalidChecksum => "mnemonic checksum mismatch".to_string(),
        bip39::Error::AmbiguousLanguages(_) => "mnemonic language is ambiguous".to_string(),
    };
    NostrError::InvalidDerivation(message)
}

/// A checksummed BIP-39 mnemonic phrase in the English wordlist.
///
/// The phrase is kept with single spaces and is zeroized on drop. `Debug`
/// prints only the word count.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Mnemonic {
    inner: bip39::Mnemonic,
    phrase: String,
}

impl Mnemonic {
    fn from_inner(inner: bip39::Mnemonic) -> Self {
        let phrase = inner.to_string();
        Self { inner, phrase }
    }

    /// Builds the mnemonic for the given entropy.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidDerivation`] unless the entropy is
    /// 16, 20, 24, 28 or 32 bytes.
    pub fn from_entropy(entropy: &[u8]) -> Result<Self> {
        bip39::Mnemonic::from_entropy_in(Language::English, entropy)
            .map(Self::from_inner)
            .map_err(mnemonic_error)
    }

    /// Parses and validates a mnemonic phrase.
    ///
    /// The input is NFKD-normalized and split on any whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidDerivation`] if the word count is not
    /// supported, a word is not in the English wordlist, or the checksum
    /// does not match. Error messages never include the words themselves.
    pub fn parse(phrase: &str) -> Result<Self> {
        bip39::Mnemonic::parse_in(Language::English, phrase)
            .map(Self::from_inner)
            .map_err(mnemonic_error)
    }

    /// Returns the phrase.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    /// Returns the individual words.
    #[must_use]
    pub fn words(&self) -> Vec<&str> {
        self.inner.words().collect()
    }

    /// Returns the number of words.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.inner.word_count()
    }

    /// Derives the 64-byte seed with an optional passphrase (`""` for none).
    ///
    /// The passphrase is NFKD-normalized first.
    #[must_use]
    pub fn to_seed(&self, passphrase: &str) -> Seed {
        let bytes = Zeroizing::new(self.inner.to_seed(passphrase));
        Seed(*bytes)
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &self.word_count())
            .finish_non_exhaustive()
    }
}

/// A 64-byte BIP-39 seed, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 64]);

impl Seed {
    /// Creates a seed from raw bytes (for stored seeds and test vectors).
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Returns the raw seed bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed([REDACTED])")
    }
}

/// Generates a new random mnemonic from the operating system's CSPRNG.
///
/// # Errors
///
/// Returns [`NostrError::Crypto`] if the randomness source fails.
pub fn generate_mnemonic(word_count: WordCount) -> Result<Mnemonic> {
    generate_mnemonic_with_rng(word_count, &mut OsRng)
}

/// Generates a new random mnemonic, drawing entropy from `rng`.
///
/// # Errors
///
/// Returns [`NostrError::Crypto`] if the randomness source fails.
pub fn generate_mnemonic_with_rng<R: RngCore + CryptoRng>(
    word_count: WordCount,
    rng: &mut R,
) -> Result<Mnemonic> {
    let mut entropy = Zeroizing::new(vec![0u8; word_count.entropy_bytes()]);
    rng.try_fill_bytes(&mut entropy)
        .map_err(|e| NostrError::Crypto(format!("randomness source unavailable: {e}")))?;
    Mnemonic::from_entropy(&entropy)
}

/// Returns `true` if `phrase` is a well-formed mnemonic with a valid checksum.
#[must_use]
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse(phrase).is_ok()
}

/// Derives the seed for a mnemonic and passphrase.
#[must_use]
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: &str) -> Seed {
    mnemonic.to_seed(passphrase)
}
