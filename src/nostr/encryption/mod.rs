//! Versioned authenticated payload encryption (NIP-44 v2).
//!
//! # Wire format
//!
//! ```text
//! base64( version(1) = 0x02 ‖ nonce(32) ‖ ciphertext(34..=65538) ‖ mac(32) )
//! ```
//!
//! # Algorithm
//!
//! 1. ECDH x-coordinate → HKDF-Extract with [`SALT`] → [`ConversationKey`]
//! 2. Random 32-byte nonce → HKDF-Expand → `ChaCha20` key, `ChaCha20` nonce, HMAC key
//! 3. Plaintext is padded (see [`calc_padded_len`]) then encrypted with `ChaCha20`
//! 4. HMAC-SHA256 over `nonce ‖ ciphertext`
//!
//! Every decryption failure returns [`NostrError::DecryptionFailed`], with
//! no indication of which check rejected the payload.

mod conversation;
mod padding;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

pub use conversation::{ConversationKey, SALT};
pub use padding::{calc_padded_len, MAX_PLAINTEXT_SIZE, MIN_PLAINTEXT_SIZE};

use crate::nostr::error::{NostrError, Result};
use crate::nostr::keys::{Keypair, PublicKey};
use conversation::MessageKeys;

/// Payload version produced by this module.
pub const VERSION: u8 = 2;

const NONCE_SIZE: usize = 32;
const MAC_SIZE: usize = 32;

/// Accepted base64 payload length, in characters.
const MIN_PAYLOAD_LEN: usize = 132;
const MAX_PAYLOAD_LEN: usize = 87_472;

/// Accepted decoded payload length, in bytes.
const MIN_DECODED_LEN: usize = 99;
const MAX_DECODED_LEN: usize = 65_603;

/// Encrypts `plaintext` from `sender` to `recipient`.
///
/// # Errors
///
/// - [`NostrError::InvalidPlaintextLength`] if the plaintext is empty or
///   longer than 65535 bytes (checked before any cryptographic work)
/// - [`NostrError::InvalidKey`] if `recipient` is not a curve point
/// - [`NostrError::Crypto`] if the randomness source fails
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::encryption;
/// use haven_protocol::nostr::Keypair;
///
/// let alice = Keypair::generate().unwrap();
/// let bob = Keypair::generate().unwrap();
///
/// let payload = encryption::encrypt(&alice, &bob.public_key(), "hi bob").unwrap();
/// let plaintext = encryption::decrypt(&bob, &alice.public_key(), &payload).unwrap();
/// assert_eq!(plaintext, "hi bob");
/// ```
pub fn encrypt(sender: &Keypair, recipient: &PublicKey, plaintext: &str) -> Result<String> {
    encrypt_with_rng(sender, recipient, plaintext, &mut OsRng)
}

/// Encrypts `plaintext` from `sender` to `recipient`, drawing the nonce
/// from `rng`.
///
/// # Errors
///
/// Same as [`encrypt`].
pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
    sender: &Keypair,
    recipient: &PublicKey,
    plaintext: &str,
    rng: &mut R,
) -> Result<String> {
    padding::check_plaintext_len(plaintext.len())?;
    let conversation_key = ConversationKey::derive(sender, recipient)?;
    encrypt_nip44_with_rng(plaintext, &conversation_key, rng)
}

/// Decrypts a payload that `sender` encrypted to `recipient`.
///
/// # Errors
///
/// - [`NostrError::InvalidKey`] if `sender` is not a curve point
/// - [`NostrError::DecryptionFailed`] for any malformed or unauthenticated payload
pub fn decrypt(recipient: &Keypair, sender: &PublicKey, payload: &str) -> Result<String> {
    let conversation_key = ConversationKey::derive(recipient, sender)?;
    decrypt_nip44(payload, &conversation_key)
}

/// Encrypts with an existing conversation key and a random nonce.
///
/// # Errors
///
/// - [`NostrError::InvalidPlaintextLength`] if the plaintext is out of range
/// - [`NostrError::Crypto`] if the randomness source fails
pub fn encrypt_nip44(plaintext: &str, conversation_key: &ConversationKey) -> Result<String> {
    encrypt_nip44_with_rng(plaintext, conversation_key, &mut OsRng)
}

/// Encrypts with an existing conversation key, drawing the nonce from `rng`.
///
/// # Errors
///
/// Same as [`encrypt_nip44`].
pub fn encrypt_nip44_with_rng<R: RngCore + CryptoRng>(
    plaintext: &str,
    conversation_key: &ConversationKey,
    rng: &mut R,
) -> Result<String> {
    padding::check_plaintext_len(plaintext.len())?;

    let mut nonce = [0u8; NONCE_SIZE];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|e| NostrError::Crypto(format!("randomness source unavailable: {e}")))?;

    encrypt_with_nonce(plaintext, conversation_key, &nonce)
}

/// Encrypts with a caller-chosen nonce.
///
/// Reusing a nonce under the same conversation key leaks the XOR of the
/// plaintexts. Outside known-answer tests use [`encrypt_nip44`].
///
/// # Errors
///
/// Returns [`NostrError::InvalidPlaintextLength`] if the plaintext is out of range.
pub fn encrypt_with_nonce(
    plaintext: &str,
    conversation_key: &ConversationKey,
    nonce: &[u8; NONCE_SIZE],
) -> Result<String> {
    let mut buffer = padding::pad(plaintext.as_bytes())?;
    let keys = MessageKeys::derive(conversation_key, nonce)?;

    apply_keystream(&keys, &mut buffer);
    let mac = keys.mac(nonce, &buffer)?;

    let mut payload = Vec::with_capacity(1 + NONCE_SIZE + buffer.len() + MAC_SIZE);
    payload.push(VERSION);
    payload.extend_from_slice(nonce);
    payload.extend_from_slice(&buffer);
    payload.extend_from_slice(&mac);

    Ok(BASE64.encode(payload))
}

/// Decrypts a payload with an existing conversation key.
///
/// Checks run in this order, all failing with the same error:
/// reserved `#` prefix, base64 length, base64 decoding, decoded length,
/// version byte, MAC (constant time), padding, UTF-8.
///
/// # Errors
///
/// Returns [`NostrError::DecryptionFailed`] for any invalid payload.
pub fn decrypt_nip44(payload: &str, conversation_key: &ConversationKey) -> Result<String> {
    let data = decode_payload(payload)?;

    let (nonce, rest) = data[1..].split_at(NONCE_SIZE);
    let (ciphertext, mac) = rest.split_at(rest.len() - MAC_SIZE);
    let nonce: &[u8; NONCE_SIZE] = nonce
        .try_into()
        .map_err(|_| NostrError::DecryptionFailed)?;

    let keys = MessageKeys::derive(conversation_key, nonce)?;
    let expected_mac = keys.mac(nonce, ciphertext)?;
    if !bool::from(expected_mac[..].ct_eq(mac)) {
        return Err(NostrError::DecryptionFailed);
    }

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    apply_keystream(&keys, &mut buffer);

    let plaintext = padding::unpad(&buffer)?;
    std::str::from_utf8(plaintext)
        .map(str::to_owned)
        .map_err(|_| NostrError::DecryptionFailed)
}

/// Validates the envelope framing and returns the decoded bytes.
fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    // '#' marks a future non-base64 encoding
    if payload.starts_with('#') {
        return Err(NostrError::DecryptionFailed);
    }
    if !(MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&payload.len()) {
        return Err(NostrError::DecryptionFailed);
    }

    let data = BASE64
        .decode(payload)
        .map_err(|_| NostrError::DecryptionFailed)?;

    if !(MIN_DECODED_LEN..=MAX_DECODED_LEN).contains(&data.len()) {
        return Err(NostrError::DecryptionFailed);
    }
    if data[0] != VERSION {
        return Err(NostrError::DecryptionFailed);
    }

    Ok(data)
}

fn apply_keystream(keys: &MessageKeys, buffer: &mut [u8]) {
    let mut cipher = ChaCha20::new(
        chacha20::Key::from_slice(&keys.chacha_key),
        chacha20::Nonce::from_slice(&keys.chacha_nonce),
    );
    cipher.apply_keystream(buffer);
}
