//! Deterministic identities from recovery phrases (NIP-06).
//!
//! A BIP-39 mnemonic is stretched into a 64-byte seed, and the seed is
//! walked down `m/44'/1237'/<account>'/0/0` with BIP-32 to produce a
//! [`Keypair`](crate::nostr::Keypair). The same phrase always yields the same
//! keys, so a user can restore their identity on a new device.
//!
//! # Example
//!
//! ```
//! use haven_protocol::nostr::identity::{derive_keypair, generate_mnemonic, WordCount};
//!
//! let mnemonic = generate_mnemonic(WordCount::Words12).unwrap();
//! let seed = mnemonic.to_seed("");
//! let keypair = derive_keypair(&seed, 0).unwrap();
//! assert_eq!(keypair.public_key().to_hex().len(), 64);
//! ```

mod derivation;
mod mnemonic;

pub use derivation::{
    derive_keypair, derive_keypair_at, ChildNumber, DerivationPath, BIP44_PURPOSE,
    NOSTR_COIN_TYPE,
};
pub use mnemonic::{
    generate_mnemonic, generate_mnemonic_with_rng, mnemonic_to_seed, validate_mnemonic, Mnemonic,
    Seed, WordCount,
};
