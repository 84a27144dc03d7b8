//! NIP-59 Gift Wrap for metadata-hiding event delivery.
//!
//! # Gift Wrap Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ Layer 3: Gift Wrap (kind 1059) - PUBLIC             │
//! │ • Signed by an ephemeral keypair (single use)       │
//! │ • Timestamp randomized into the past                │
//! │ • Only reveals: recipient (p-tag)                   │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │ Layer 2: Seal (kind 13) - ENCRYPTED           │  │
//! │  │ • Payload-encrypted for recipient             │  │
//! │  │ • Signed by sender's real key                 │  │
//! │  │ • No tags                                     │  │
//! │  │  ┌─────────────────────────────────────────┐  │  │
//! │  │  │ Layer 1: Rumor (any kind) - UNSIGNED    │  │  │
//! │  │  │ • The real message                      │  │  │
//! │  │  │ • Deniable if leaked                    │  │  │
//! │  │  └─────────────────────────────────────────┘  │  │
//! │  └───────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Security
//!
//! - **Metadata protection**: Sender identity hidden behind ephemeral key
//! - **Unsigned rumor**: Trust comes from the seal signature, never the rumor
//! - **Ephemeral keys**: Created and dropped inside [`wrap_with`], never returned
//! - **Impersonation guard**: The rumor author must equal the seal signer

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

use crate::nostr::encryption;
use crate::nostr::error::{NostrError, Result};
use crate::nostr::event::{Event, UnsignedEvent};
use crate::nostr::keys::{Keypair, PublicKey};
use crate::nostr::kind::Kind;
use crate::nostr::tags::{Tag, TagBuilder};
use crate::nostr::time::{Clock, SystemClock, Timestamp};

/// Kind for Seal (NIP-59).
pub const KIND_SEAL: Kind = Kind::SEAL;

/// Kind for Gift Wrap (NIP-59).
pub const KIND_GIFT_WRAP: Kind = Kind::GIFT_WRAP;

/// Default window for backdating seal and wrap timestamps: two days.
pub const DEFAULT_MAX_TIMESTAMP_SKEW: u64 = 2 * 24 * 60 * 60;

/// Options controlling how a gift wrap is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftWrapOptions {
    /// Largest backdating applied to randomized timestamps, in seconds.
    pub max_timestamp_skew: u64,

    /// Backdate the seal by a random amount within the skew window.
    pub randomize_seal_timestamp: bool,

    /// Backdate the wrap by a random amount within the skew window.
    pub randomize_wrap_timestamp: bool,

    /// Tags appended to the wrap after the recipient `p` tag
    /// (for example a NIP-40 `expiration` tag).
    pub extra_wrap_tags: Vec<Tag>,
}

impl Default for GiftWrapOptions {
    fn default() -> Self {
        Self {
            max_timestamp_skew: DEFAULT_MAX_TIMESTAMP_SKEW,
            randomize_seal_timestamp: true,
            randomize_wrap_timestamp: true,
            extra_wrap_tags: Vec::new(),
        }
    }
}

/// Result of unwrapping a gift wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrappedGift {
    /// The sender's real public key, authenticated by the seal signature.
    pub sender: PublicKey,

    /// The unsigned inner event.
    pub rumor: UnsignedEvent,
}

/// Gift-wraps a rumor for `recipient` with default options.
///
/// # Errors
///
/// See [`wrap_with`].
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::giftwrap;
/// use haven_protocol::nostr::{Keypair, Kind, Timestamp, UnsignedEvent};
///
/// let alice = Keypair::generate().unwrap();
/// let bob = Keypair::generate().unwrap();
/// let rumor = UnsignedEvent::new(
///     alice.public_key(),
///     Timestamp::from_secs(1_700_000_000),
///     Kind::PRIVATE_DIRECT_MESSAGE,
///     Vec::new(),
///     "psst",
/// );
///
/// let wrapped = giftwrap::wrap(&alice, &bob.public_key(), &rumor).unwrap();
/// assert_ne!(wrapped.pubkey(), alice.public_key());
///
/// let opened = giftwrap::unwrap(&bob, &wrapped).unwrap();
/// assert_eq!(opened.sender, alice.public_key());
/// assert_eq!(opened.rumor, rumor);
/// ```
pub fn wrap(sender: &Keypair, recipient: &PublicKey, rumor: &UnsignedEvent) -> Result<Event> {
    wrap_with(
        sender,
        recipient,
        rumor,
        &GiftWrapOptions::default(),
        &mut OsRng,
        &SystemClock,
    )
}

/// Gift-wraps a rumor for `recipient`.
///
/// Creates a three-layer envelope:
/// 1. Rumor (unsigned) - the actual message
/// 2. Seal (kind 13, no tags) - rumor encrypted to recipient, signed by sender
/// 3. Gift Wrap (kind 1059, `p` tag) - seal encrypted to recipient, signed
///    by a fresh ephemeral key that is dropped before this function returns
///
/// # Errors
///
/// - [`NostrError::KeyMismatch`] if the rumor is not authored by `sender`
/// - [`NostrError::InvalidKey`] if `recipient` is not a curve point
/// - [`NostrError::InvalidPlaintextLength`] if a layer exceeds the payload limit
/// - [`NostrError::Crypto`] if the randomness source fails
pub fn wrap_with<R, C>(
    sender: &Keypair,
    recipient: &PublicKey,
    rumor: &UnsignedEvent,
    options: &GiftWrapOptions,
    rng: &mut R,
    clock: &C,
) -> Result<Event>
where
    R: RngCore + CryptoRng,
    C: Clock + ?Sized,
{
    if rumor.pubkey != sender.public_key() {
        return Err(NostrError::KeyMismatch);
    }

    let now = clock.now();
    let seal_created_at = backdate(
        now,
        options.randomize_seal_timestamp,
        options.max_timestamp_skew,
        rng,
    );
    let seal = seal(sender, recipient, &rumor.to_json()?, seal_created_at, rng)?;

    let wrap_created_at = backdate(
        now,
        options.randomize_wrap_timestamp,
        options.max_timestamp_skew,
        rng,
    );
    let wrap = wrap_seal(
        &seal,
        recipient,
        wrap_created_at,
        &options.extra_wrap_tags,
        rng,
    )?;

    tracing::debug!(wrap_id = %wrap.id(), "created gift wrap");
    Ok(wrap)
}

/// Unwraps a received gift wrap.
///
/// 1. Checks the wrap kind and verifies the wrap signature
/// 2. Decrypts the seal using the recipient key and the wrap's ephemeral pubkey
/// 3. Checks the seal kind, rejects a seal with tags, and verifies the seal
///    signature
/// 4. Decrypts the rumor using the recipient key and the seal author
/// 5. Requires the rumor author to equal the seal author
///
/// Any `sig` carried by the rumor is ignored.
///
/// # Errors
///
/// - [`NostrError::InvalidEvent`] for a wrong kind, a tagged seal, bad id,
///   malformed inner JSON, or a rumor author that differs from the seal signer
/// - [`NostrError::InvalidSignature`] if either signature fails
/// - [`NostrError::DecryptionFailed`] if the wrap was not for this recipient
///   or either payload is corrupt
pub fn unwrap(recipient: &Keypair, gift_wrap: &Event) -> Result<UnwrappedGift> {
    if gift_wrap.kind() != KIND_GIFT_WRAP {
        return Err(NostrError::InvalidEvent(format!(
            "Event is not a gift wrap (kind {KIND_GIFT_WRAP}), got {}",
            gift_wrap.kind()
        )));
    }
    gift_wrap.verify_signature()?;

    let seal_json = encryption::decrypt(recipient, &gift_wrap.pubkey(), gift_wrap.content())?;
    let seal = Event::from_json(&seal_json)?;

    if seal.kind() != KIND_SEAL {
        return Err(NostrError::InvalidEvent(format!(
            "Gift wrap does not contain a seal (kind {KIND_SEAL}), got {}",
            seal.kind()
        )));
    }
    if !seal.tags().is_empty() {
        return Err(NostrError::InvalidEvent("Seal must not carry tags".to_string()));
    }
    seal.verify_signature()?;

    let rumor_json = encryption::decrypt(recipient, &seal.pubkey(), seal.content())?;
    let rumor = UnsignedEvent::from_json(&rumor_json)?;

    if rumor.pubkey != seal.pubkey() {
        return Err(NostrError::InvalidEvent(
            "Rumor author does not match seal signer".to_string(),
        ));
    }

    Ok(UnwrappedGift {
        sender: seal.pubkey(),
        rumor,
    })
}

/// Encrypts serialized rumor JSON to `recipient` and signs it as a seal.
fn seal<R: RngCore + CryptoRng>(
    sender: &Keypair,
    recipient: &PublicKey,
    rumor_json: &str,
    created_at: Timestamp,
    rng: &mut R,
) -> Result<Event> {
    let content = encryption::encrypt_with_rng(sender, recipient, rumor_json, rng)?;
    UnsignedEvent::new(sender.public_key(), created_at, KIND_SEAL, Vec::new(), content)
        .sign_with_rng(sender, rng)
}

/// Encrypts a seal to `recipient` under a single-use ephemeral key.
fn wrap_seal<R: RngCore + CryptoRng>(
    seal: &Event,
    recipient: &PublicKey,
    created_at: Timestamp,
    extra_tags: &[Tag],
    rng: &mut R,
) -> Result<Event> {
    // Dropped (and zeroized) when this function returns
    let ephemeral = Keypair::generate_with_rng(rng)?;

    let content = encryption::encrypt_with_rng(&ephemeral, recipient, &seal.to_json()?, rng)?;

    let mut tags = Vec::with_capacity(1 + extra_tags.len());
    tags.push(TagBuilder::p_tag(recipient));
    tags.extend_from_slice(extra_tags);

    UnsignedEvent::new(ephemeral.public_key(), created_at, KIND_GIFT_WRAP, tags, content)
        .sign_with_rng(&ephemeral, rng)
}

/// Moves `now` up to `max_skew` seconds into the past when enabled.
fn backdate<R: RngCore>(now: Timestamp, enabled: bool, max_skew: u64, rng: &mut R) -> Timestamp {
    if enabled && max_skew > 0 {
        now.saturating_sub_secs(rng.gen_range(0..=max_skew))
    } else {
        now
    }
}
