//! Tag builders for Nostr events.
//!
//! This module provides utilities for constructing the tags the protocol
//! core emits itself:
//! - `p` tag: recipient public key (NIP-59 gift wraps)
//! - `nonce` tag: proof-of-work counter and committed target (NIP-13)
//! - `expiration` tag: NIP-40 automatic expiration

use chrono::{DateTime, Utc};

use crate::nostr::keys::PublicKey;

/// A single event tag: a name followed by zero or more values.
pub type Tag = Vec<String>;

/// Builder for Nostr event tags.
///
/// Provides static methods for constructing properly formatted tags.
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::TagBuilder;
///
/// let tag = TagBuilder::nonce_tag(42, 16);
/// assert_eq!(tag, vec!["nonce", "42", "16"]);
/// ```
pub struct TagBuilder;

impl TagBuilder {
    /// Builds the `p` tag addressing an event to a public key.
    #[must_use]
    pub fn p_tag(public_key: &PublicKey) -> Tag {
        vec!["p".to_string(), public_key.to_hex()]
    }

    /// Builds the NIP-13 `nonce` tag.
    ///
    /// # Arguments
    ///
    /// * `counter` - The value varied while mining
    /// * `target_difficulty` - The difficulty the miner committed to
    #[must_use]
    pub fn nonce_tag(counter: u64, target_difficulty: u16) -> Tag {
        vec![
            "nonce".to_string(),
            counter.to_string(),
            target_difficulty.to_string(),
        ]
    }

    /// Builds the `expiration` tag for NIP-40 automatic expiration.
    ///
    /// Relays that support NIP-40 will automatically delete events
    /// after the specified timestamp.
    ///
    /// # Example
    ///
    /// ```
    /// use haven_protocol::nostr::TagBuilder;
    /// use chrono::{Utc, Duration};
    ///
    /// let expires = Utc::now() + Duration::hours(24);
    /// let tag = TagBuilder::expiration_tag(expires);
    /// assert_eq!(tag[0], "expiration");
    /// ```
    #[must_use]
    pub fn expiration_tag(expires_at: DateTime<Utc>) -> Tag {
        vec!["expiration".to_string(), expires_at.timestamp().to_string()]
    }

    /// Returns the first tag whose name equals `name`.
    #[must_use]
    pub fn find<'a>(tags: &'a [Tag], name: &str) -> Option<&'a Tag> {
        tags.iter()
            .find(|tag| tag.first().is_some_and(|first| first == name))
    }
}
