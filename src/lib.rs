//! Haven Protocol Library
//!
//! Protocol primitives for Haven's Nostr layer: key pairs and Schnorr
//! signatures, canonical event identifiers, NIP-44 payload encryption,
//! NIP-59 gift wrapping, NIP-06 key derivation and NIP-13 proof of work.
//!
//! The crate performs no network I/O. Transport, storage and relay
//! selection belong to the applications that consume it.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod nostr;
