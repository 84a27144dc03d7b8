//! Nostr protocol primitives.
//!
//! This module provides everything needed to author, protect and check
//! Nostr events without touching the network.
//!
//! # Architecture
//!
//! ```text
//! Keypair ──────────────┬──────────────────────────────┐
//!    │                  │                              │
//!    ▼                  ▼                              ▼
//! UnsignedEvent ──► canonical id ──► Event (signed)   ECDH
//!    │                  ▲                              │
//!    │                  │                              ▼
//!    └──► pow::mine ────┘                   encryption (NIP-44 v2)
//!                                                      │
//!                                                      ▼
//!                                  giftwrap: rumor → seal (13) → wrap (1059)
//!
//! identity: mnemonic → seed → m/44'/1237'/<account>'/0/0 → Keypair
//! ```
//!
//! # Security
//!
//! - Secret material is zeroized on drop and never printed by `Debug`
//! - Event ids are always recomputed during verification
//! - Decryption failures are reported through a single opaque error
//! - Gift wraps are signed with single-use ephemeral keys that never leave
//!   the wrapping function
//!
//! # Example
//!
//! ```
//! use haven_protocol::nostr::{Keypair, Kind, Timestamp, UnsignedEvent};
//!
//! let keys = Keypair::generate().unwrap();
//! let note = UnsignedEvent::new(
//!     keys.public_key(),
//!     Timestamp::from_secs(1_700_000_000),
//!     Kind::TEXT_NOTE,
//!     Vec::new(),
//!     "hello",
//! );
//!
//! let event = note.sign(&keys).unwrap();
//! assert!(event.verify());
//! ```

mod canonical;
mod error;
mod event;
mod keys;
mod kind;
mod tags;
mod time;

pub mod encryption;
pub mod giftwrap;
pub mod identity;
pub mod pow;

pub use canonical::{canonical_json, EventId};
pub use error::{NostrError, Result};
pub use event::{Event, UnsignedEvent};
pub use keys::{verify_signature, Keypair, PublicKey, Signature, SECP};
pub use kind::Kind;
pub use tags::{Tag, TagBuilder};
pub use time::{Clock, FixedClock, SystemClock, Timestamp};
