//! Reusable fixtures for integration tests.
//!
//! Randomness and time are pinned so failures reproduce: every helper that
//! needs an RNG takes a seed, and events use fixed timestamps.

#![allow(dead_code)]

use haven_protocol::nostr::{FixedClock, Keypair, Kind, Tag, Timestamp, UnsignedEvent};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Wall time used by fixture events: 2023-11-14T22:13:20Z.
pub const FIXED_NOW: u64 = 1_700_000_000;

/// Deterministic RNG for a test.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A clock pinned to [`FIXED_NOW`].
pub const fn fixed_clock() -> FixedClock {
    FixedClock(Timestamp::from_secs(FIXED_NOW))
}

/// Keypair whose secret scalar is the small integer `n`.
///
/// Small scalars are valid keys and match published test vectors.
pub fn scalar_keypair(n: u8) -> Keypair {
    let mut secret = [0u8; 32];
    secret[31] = n;
    Keypair::from_secret_bytes(secret).expect("small scalar is a valid key")
}

/// A named participant with a deterministic key.
pub struct Participant {
    pub name: &'static str,
    pub keys: Keypair,
}

impl Participant {
    pub fn new(name: &'static str, seed: u64) -> Self {
        let keys = Keypair::generate_with_rng(&mut seeded_rng(seed))
            .expect("seeded RNG yields a key");
        Self { name, keys }
    }
}

/// Alice and Bob, always the same keys.
pub fn alice_and_bob() -> (Participant, Participant) {
    (Participant::new("alice", 1), Participant::new("bob", 2))
}

/// An unsigned note from `author` at [`FIXED_NOW`].
pub fn note(author: &Keypair, content: &str) -> UnsignedEvent {
    UnsignedEvent::new(
        author.public_key(),
        Timestamp::from_secs(FIXED_NOW),
        Kind::TEXT_NOTE,
        Vec::new(),
        content,
    )
}

/// An unsigned direct message (kind 14) addressed to `recipient`.
pub fn direct_message(author: &Keypair, recipient: &Keypair, content: &str) -> UnsignedEvent {
    let tags: Vec<Tag> = vec![vec!["p".to_string(), recipient.public_key().to_hex()]];
    UnsignedEvent::new(
        author.public_key(),
        Timestamp::from_secs(FIXED_NOW),
        Kind::PRIVATE_DIRECT_MESSAGE,
        tags,
        content,
    )
}
