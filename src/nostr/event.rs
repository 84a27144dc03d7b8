//! Nostr events in their unsigned and signed forms.
//!
//! - `UnsignedEvent`: freely editable fields, no id or signature. Also the
//!   shape of a NIP-59 rumor.
//! - `Event`: produced only by signing; fields are read-only. Editing goes
//!   back through [`Event::into_unsigned`] and forces a new signature.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::nostr::canonical::EventId;
use crate::nostr::error::{NostrError, Result};
use crate::nostr::keys::{self, Keypair, PublicKey, Signature};
use crate::nostr::kind::Kind;
use crate::nostr::tags::Tag;
use crate::nostr::time::Timestamp;

/// An event that has not been signed.
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::{Keypair, Kind, Timestamp, UnsignedEvent};
///
/// let keys = Keypair::generate().unwrap();
/// let mut draft = UnsignedEvent::new(
///     keys.public_key(),
///     Timestamp::from_secs(1_700_000_000),
///     Kind::TEXT_NOTE,
///     Vec::new(),
///     "hi",
/// );
/// draft.content.push('!');
///
/// let event = draft.sign(&keys).unwrap();
/// assert_eq!(event.content(), "hi!");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    /// Author public key
    pub pubkey: PublicKey,

    /// Unix timestamp when the event was created
    pub created_at: Timestamp,

    /// Event kind
    pub kind: Kind,

    /// Event tags
    pub tags: Vec<Tag>,

    /// Arbitrary string content
    pub content: String,
}

/// Wire form of an unsigned event. Unknown fields (`id`, `sig`) are ignored.
#[derive(Deserialize)]
struct RawUnsignedEvent {
    pubkey: PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: Vec<Tag>,
    content: String,
}

/// Serialized form of an unsigned event, id included.
#[derive(Serialize)]
struct UnsignedEventJson<'a> {
    id: EventId,
    pubkey: &'a PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: &'a [Tag],
    content: &'a str,
}

impl UnsignedEvent {
    /// Creates a new unsigned event.
    #[must_use]
    pub fn new(
        pubkey: PublicKey,
        created_at: Timestamp,
        kind: Kind,
        tags: Vec<Tag>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            pubkey,
            created_at,
            kind,
            tags,
            content: content.into(),
        }
    }

    /// Computes the event id from the current fields.
    ///
    /// # Errors
    ///
    /// Returns an error if canonical serialization fails.
    pub fn compute_id(&self) -> Result<EventId> {
        EventId::compute(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Signs this event with the author's keypair.
    ///
    /// # Errors
    ///
    /// - [`NostrError::KeyMismatch`] if `keypair` is not the key in `pubkey`
    /// - [`NostrError::Crypto`] if the randomness source fails
    pub fn sign(&self, keypair: &Keypair) -> Result<Event> {
        self.sign_with_rng(keypair, &mut OsRng)
    }

    /// Signs this event, drawing signature auxiliary randomness from `rng`.
    ///
    /// # Errors
    ///
    /// Same as [`UnsignedEvent::sign`].
    pub fn sign_with_rng<R: RngCore + CryptoRng>(
        &self,
        keypair: &Keypair,
        rng: &mut R,
    ) -> Result<Event> {
        if keypair.public_key() != self.pubkey {
            return Err(NostrError::KeyMismatch);
        }

        let id = self.compute_id()?;
        let sig = keypair.sign_with_rng(id.as_bytes(), rng)?;

        Ok(Event {
            id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
            sig,
        })
    }

    /// Serializes this event to JSON, including its computed `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let json = UnsignedEventJson {
            id: self.compute_id()?,
            pubkey: &self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: &self.tags,
            content: &self.content,
        };
        serde_json::to_string(&json).map_err(NostrError::from)
    }

    /// Deserializes an unsigned event from JSON.
    ///
    /// Any `id` or `sig` fields present are ignored; the id is always
    /// recomputed from the other fields.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidEvent`] if the JSON is malformed or a
    /// field is out of range (for example a negative kind).
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawUnsignedEvent = serde_json::from_str(json).map_err(malformed)?;
        Ok(Self {
            pubkey: raw.pubkey,
            created_at: raw.created_at,
            kind: raw.kind,
            tags: raw.tags,
            content: raw.content,
        })
    }
}

/// A signed Nostr event.
///
/// # Structure
///
/// ```json
/// {
///   "id": "...",           // SHA256 of the canonical form
///   "pubkey": "...",       // Author x-only public key
///   "created_at": 123456,  // Unix timestamp
///   "kind": 1,
///   "tags": [["p", "..."]],
///   "content": "...",
///   "sig": "..."           // Schnorr signature over id
/// }
/// ```
///
/// An `Event` read from JSON is not trusted: call [`Event::verify`] before
/// relying on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    pubkey: PublicKey,
    created_at: Timestamp,
    kind: Kind,
    tags: Vec<Tag>,
    content: String,
    sig: Signature,
}

impl Event {
    /// Event id as stored on the event.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Author public key.
    #[must_use]
    pub const fn pubkey(&self) -> PublicKey {
        self.pubkey
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Event kind.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// Event tags.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Event content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Schnorr signature over the id.
    #[must_use]
    pub const fn sig(&self) -> Signature {
        self.sig
    }

    /// Returns `true` only if the stored id matches the fields and the
    /// signature is valid for that id and pubkey.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.verify_signature().is_ok()
    }

    /// Verifies the event id and signature.
    ///
    /// The id is always recomputed from the current fields; the stored id
    /// is never trusted.
    ///
    /// # Errors
    ///
    /// - [`NostrError::InvalidEvent`] if the stored id does not match
    /// - [`NostrError::InvalidSignature`] if the signature does not verify
    pub fn verify_signature(&self) -> Result<()> {
        let calculated_id = EventId::compute(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )?;

        // Constant-time comparison
        if !calculated_id.ct_matches(&self.id) {
            return Err(NostrError::InvalidEvent("Event ID mismatch".to_string()));
        }

        if keys::verify_signature(&self.pubkey, self.id.as_bytes(), &self.sig) {
            Ok(())
        } else {
            Err(NostrError::InvalidSignature)
        }
    }

    /// Drops the id and signature, returning an editable event.
    #[must_use]
    pub fn into_unsigned(self) -> UnsignedEvent {
        UnsignedEvent {
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
        }
    }

    /// Serializes this event to JSON for transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(NostrError::from)
    }

    /// Deserializes a signed event from JSON without verifying it.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidEvent`] if the JSON is malformed or any
    /// field has the wrong shape.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(malformed)
    }
}

/// Maps a parse failure to `InvalidEvent` without echoing field values,
/// which may be decrypted plaintext.
fn malformed(e: serde_json::Error) -> NostrError {
    NostrError::InvalidEvent(format!(
        "malformed event JSON at line {} column {}",
        e.line(),
        e.column()
    ))
}
