//! Conversation key and per-message subkey derivation.

use std::fmt;

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::nostr::error::{NostrError, Result};
use crate::nostr::keys::{Keypair, PublicKey};

/// HKDF-Extract salt for v2 conversation keys.
pub const SALT: &[u8] = b"nip44-v2";

type HmacSha256 = Hmac<Sha256>;

/// A 32-byte key shared by two parties, derived once and reused for every
/// message between them.
///
/// Both directions derive the same key: `derive(a, B) == derive(b, A)`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ConversationKey([u8; 32]);

impl ConversationKey {
    /// Derives the conversation key between `keypair` and `public_key`.
    ///
    /// The raw ECDH x-coordinate is only used as HKDF input keying
    /// material, never as a key directly.
    ///
    /// # Errors
    ///
    /// Returns [`NostrError::InvalidKey`] if `public_key` is not a curve point.
    pub fn derive(keypair: &Keypair, public_key: &PublicKey) -> Result<Self> {
        let shared_x = keypair.shared_secret(public_key)?;
        let (prk, _) = Hkdf::<Sha256>::extract(Some(SALT), &shared_x[..]);
        Ok(Self(prk.into()))
    }

    /// Wraps an existing 32-byte conversation key.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversationKey([REDACTED])")
    }
}

/// Subkeys for a single message, expanded from the conversation key and
/// that message's nonce.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct MessageKeys {
    pub(crate) chacha_key: [u8; 32],
    pub(crate) chacha_nonce: [u8; 12],
    hmac_key: [u8; 32],
}

impl MessageKeys {
    /// `HKDF-Expand(conversation_key, info = nonce, L = 76)`.
    pub(crate) fn derive(conversation_key: &ConversationKey, nonce: &[u8; 32]) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::from_prk(conversation_key.as_bytes())
            .map_err(|_| NostrError::Internal("conversation key has wrong length".to_string()))?;

        let mut okm = Zeroizing::new([0u8; 76]);
        hkdf.expand(nonce, &mut okm[..])
            .map_err(|_| NostrError::Internal("message key expansion failed".to_string()))?;

        let mut keys = Self {
            chacha_key: [0u8; 32],
            chacha_nonce: [0u8; 12],
            hmac_key: [0u8; 32],
        };
        keys.chacha_key.copy_from_slice(&okm[..32]);
        keys.chacha_nonce.copy_from_slice(&okm[32..44]);
        keys.hmac_key.copy_from_slice(&okm[44..]);
        Ok(keys)
    }

    /// HMAC-SHA256 over `nonce ‖ ciphertext` with the message HMAC key.
    pub(crate) fn mac(&self, nonce: &[u8; 32], ciphertext: &[u8]) -> Result<[u8; 32]> {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_key)
            .map_err(|_| NostrError::Internal("invalid HMAC key length".to_string()))?;
        mac.update(nonce);
        mac.update(ciphertext);
        Ok(mac.finalize().into_bytes().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(last_byte: u8) -> Keypair {
        let mut secret = [0u8; 32];
        secret[31] = last_byte;
        Keypair::from_secret_bytes(secret).unwrap()
    }

    #[test]
    fn conversation_key_reference_vector() {
        let key = ConversationKey::derive(&keypair(1), &keypair(2).public_key()).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "c41c775356fd92eadc63ff5a0dc1da211b268cbea22316767095b2871ea1412d"
        );
    }

    #[test]
    fn conversation_key_is_symmetric() {
        let alice = Keypair::generate().unwrap();
        let bob = Keypair::generate().unwrap();

        let ab = ConversationKey::derive(&alice, &bob.public_key()).unwrap();
        let ba = ConversationKey::derive(&bob, &alice.public_key()).unwrap();
        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn conversation_key_differs_from_raw_shared_secret() {
        let alice = keypair(1);
        let bob = keypair(2);

        let shared = alice.shared_secret(&bob.public_key()).unwrap();
        let key = ConversationKey::derive(&alice, &bob.public_key()).unwrap();
        assert_ne!(key.as_bytes(), &*shared);
    }

    #[test]
    fn message_keys_depend_on_nonce() {
        let key = ConversationKey::from_bytes([7u8; 32]);
        let a = MessageKeys::derive(&key, &[1u8; 32]).unwrap();
        let b = MessageKeys::derive(&key, &[2u8; 32]).unwrap();

        assert_ne!(a.chacha_key, b.chacha_key);
        assert_ne!(a.chacha_nonce, b.chacha_nonce);
        assert_ne!(a.hmac_key, b.hmac_key);
    }

    #[test]
    fn subkeys_are_independent() {
        let key = ConversationKey::from_bytes([7u8; 32]);
        let keys = MessageKeys::derive(&key, &[1u8; 32]).unwrap();
        assert_ne!(keys.chacha_key, keys.hmac_key);
    }

    #[test]
    fn debug_redacts_key() {
        let key = ConversationKey::from_bytes([0xab; 32]);
        let debug_output = format!("{key:?}");
        assert!(!debug_output.contains("ab"));
        assert!(debug_output.contains("REDACTED"));
    }
}
