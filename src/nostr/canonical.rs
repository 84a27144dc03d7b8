//! Canonical event serialization and identifier computation (NIP-01).
//!
//! The id of an event is the SHA-256 of the UTF-8 bytes of
//! `[0,<pubkey hex>,<created_at>,<kind>,<tags>,<content>]`, serialized with:
//!
//! - no insignificant whitespace
//! - `/` left unescaped
//! - `"`, `\`, and control characters escaped as in standard JSON
//! - every non-ASCII character escaped as lowercase `\uXXXX`, astral code
//!   points as a UTF-16 surrogate pair
//!
//! The output is therefore pure ASCII. These rules are a wire contract;
//! any other serialization of the same event hashes to a different id.

use std::fmt;
use std::io;

use serde::ser::Serialize;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::ser::Formatter;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::nostr::error::{NostrError, Result};
use crate::nostr::keys::{decode_hex_array, PublicKey};
use crate::nostr::kind::Kind;
use crate::nostr::pow;
use crate::nostr::tags::Tag;
use crate::nostr::time::Timestamp;

/// Compact JSON formatter that additionally escapes all non-ASCII text.
///
/// `serde_json` routes quote, backslash and control characters through
/// `write_char_escape`, whose defaults already match the canonical rules.
/// Only the unescaped fragments between them need rewriting.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let bytes = fragment.as_bytes();
        let mut start = 0;

        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }

            writer.write_all(&bytes[start..index])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + ch.len_utf8();
        }

        writer.write_all(&bytes[start..])
    }
}

/// Serializes the signable fields of an event into canonical form.
///
/// # Errors
///
/// Returns [`NostrError::Serialization`] if serialization fails.
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::{canonical_json, Kind, PublicKey, Timestamp};
///
/// let json = canonical_json(
///     &PublicKey::from_bytes([0u8; 32]),
///     Timestamp::from_secs(0),
///     Kind::TEXT_NOTE,
///     &[],
///     "café",
/// )
/// .unwrap();
/// assert!(json.ends_with(r#",0,1,[],"caf\u00e9"]"#));
/// ```
pub fn canonical_json(
    pubkey: &PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: &[Tag],
    content: &str,
) -> Result<String> {
    let mut buf = Vec::with_capacity(128 + content.len());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    (0u8, pubkey, created_at, kind, tags, content).serialize(&mut serializer)?;

    String::from_utf8(buf)
        .map_err(|_| NostrError::Internal("canonical form is not valid UTF-8".to_string()))
}

/// A 32-byte event identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId([u8; 32]);

impl EventId {
    /// Computes the id of an event from its signable fields.
    ///
    /// This is a pure function: identical input always produces the same id.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::Serialization`] if serialization fails.
    pub fn compute(
        pubkey: &PublicKey,
        created_at: Timestamp,
        kind: Kind,
        tags: &[Tag],
        content: &str,
    ) -> Result<Self> {
        let serialized = canonical_json(pubkey, created_at, kind, tags, content)?;
        Ok(Self(Sha256::digest(serialized.as_bytes()).into()))
    }

    /// Wraps raw id bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a 64-character hex id.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::HexError`] if the input is not 64 hex characters.
    pub fn from_hex(input: &str) -> Result<Self> {
        decode_hex_array(input).map(Self)
    }

    /// Returns the raw id bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the id as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the NIP-13 difficulty (leading zero bits) of this id.
    #[must_use]
    pub fn difficulty(&self) -> u16 {
        pow::difficulty(self)
    }

    /// Compares two ids in constant time.
    pub(crate) fn ct_matches(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.to_hex())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
