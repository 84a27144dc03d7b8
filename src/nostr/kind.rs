//! Event kind numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A Nostr event kind.
///
/// Kinds are 16-bit unsigned integers on the wire. The constants below cover
/// the kinds this crate produces or inspects; any other value round-trips
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(u16);

impl Kind {
    /// User metadata (NIP-01).
    pub const METADATA: Self = Self(0);

    /// Short text note (NIP-01).
    pub const TEXT_NOTE: Self = Self(1);

    /// Follow list (NIP-02).
    pub const CONTACT_LIST: Self = Self(3);

    /// Deletion request (NIP-09).
    pub const DELETION: Self = Self(5);

    /// Reaction (NIP-25).
    pub const REACTION: Self = Self(7);

    /// Sealed rumor (NIP-59).
    pub const SEAL: Self = Self(13);

    /// Private direct message carried inside a gift wrap (NIP-17).
    pub const PRIVATE_DIRECT_MESSAGE: Self = Self(14);

    /// Gift wrap (NIP-59).
    pub const GIFT_WRAP: Self = Self(1059);

    /// Creates a kind from its wire value.
    #[must_use]
    pub const fn new(kind: u16) -> Self {
        Self(kind)
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns a short human-readable name for well-known kinds.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("metadata"),
            1 => Some("text-note"),
            3 => Some("contact-list"),
            5 => Some("deletion"),
            7 => Some("reaction"),
            13 => Some("seal"),
            14 => Some("private-direct-message"),
            1059 => Some("gift-wrap"),
            _ => None,
        }
    }
}

impl From<u16> for Kind {
    fn from(kind: u16) -> Self {
        Self(kind)
    }
}

impl From<Kind> for u16 {
    fn from(kind: Kind) -> Self {
        kind.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gift_wrap_constants() {
        assert_eq!(Kind::SEAL.as_u16(), 13);
        assert_eq!(Kind::GIFT_WRAP.as_u16(), 1059);
        assert_eq!(Kind::PRIVATE_DIRECT_MESSAGE.as_u16(), 14);
    }

    #[test]
    fn names_for_known_kinds() {
        assert_eq!(Kind::TEXT_NOTE.name(), Some("text-note"));
        assert_eq!(Kind::GIFT_WRAP.name(), Some("gift-wrap"));
        assert_eq!(Kind::new(4242).name(), None);
    }

    #[test]
    fn serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&Kind::GIFT_WRAP).unwrap(), "1059");
        let kind: Kind = serde_json::from_str("65535").unwrap();
        assert_eq!(kind.as_u16(), u16::MAX);
    }

    #[test]
    fn rejects_out_of_range_kind() {
        assert!(serde_json::from_str::<Kind>("65536").is_err());
        assert!(serde_json::from_str::<Kind>("-1").is_err());
    }

    #[test]
    fn unknown_kinds_round_trip_unchanged() {
        for value in [2, 10002, 20001, u16::MAX] {
            let kind = Kind::from(value);
            assert_eq!(kind.name(), None);
            assert_eq!(u16::from(kind), value);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(serde_json::from_str::<Kind>(&json).unwrap(), kind);
        }
    }
}
