//! Property-based tests for security-critical operations.
//!
//! These tests focus on:
//! - Key handling and validation
//! - Signature creation and verification
//! - Tamper detection on signed events
//! - Boundary conditions on key and event inputs

mod helpers;

use haven_protocol::nostr::{
    verify_signature, EventId, Keypair, Kind, NostrError, PublicKey, Signature, Timestamp,
    UnsignedEvent,
};
use proptest::prelude::*;

/// Secret keys below the curve order with varied shapes.
fn secret_key_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop_oneof![
        // Plain random keys in the low half of the range
        prop::array::uniform32(0u8..=127u8).prop_filter("non-zero", |k| k.iter().any(|&b| b != 0)),
        // Keys with long runs of leading zeros
        (prop::array::uniform16(0u8..=3u8), prop::array::uniform16(1u8..=255u8)).prop_map(
            |(a, b)| {
                let mut key = [0u8; 32];
                key[..16].copy_from_slice(&a);
                key[16..].copy_from_slice(&b);
                key
            }
        ),
    ]
}

fn tag_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec("[a-z0-9]{0,8}", 1..4), 0..4)
}

fn event_strategy() -> impl Strategy<Value = ([u8; 32], u64, u16, Vec<Vec<String>>, String)> {
    (
        secret_key_strategy(),
        0u64..=4_000_000_000,
        any::<u16>(),
        tag_strategy(),
        "\\PC{0,200}",
    )
}

proptest! {
    /// Every signed event verifies.
    #[test]
    fn sign_then_verify(
        (secret, created_at, kind, tags, content) in event_strategy(),
    ) {
        let keys = Keypair::from_secret_bytes(secret).unwrap();
        let event = UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from_secs(created_at),
            Kind::new(kind),
            tags,
            content,
        )
        .sign(&keys)
        .unwrap();

        prop_assert!(event.verify());
        prop_assert_eq!(event.id(), event.clone().into_unsigned().compute_id().unwrap());
    }

    /// The id is stable across repeated computation.
    #[test]
    fn id_is_deterministic(
        (secret, created_at, kind, tags, content) in event_strategy(),
    ) {
        let keys = Keypair::from_secret_bytes(secret).unwrap();
        let draft = UnsignedEvent::new(
            keys.public_key(),
            Timestamp::from_secs(created_at),
            Kind::new(kind),
            tags,
            content,
        );
        prop_assert_eq!(draft.compute_id().unwrap(), draft.compute_id().unwrap());
        prop_assert_eq!(draft.compute_id().unwrap().difficulty(), draft.compute_id().unwrap().difficulty());
    }

    /// Changing the content after signing invalidates the event.
    #[test]
    fn content_tamper_detected(
        secret in secret_key_strategy(),
        content in "[a-z]{1,50}",
        suffix in "[A-Z]{1,5}",
    ) {
        let keys = Keypair::from_secret_bytes(secret).unwrap();
        let event = helpers::note(&keys, &content).sign(&keys).unwrap();

        let mut json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        json["content"] = serde_json::Value::String(format!("{content}{suffix}"));
        let tampered = haven_protocol::nostr::Event::from_json(&json.to_string()).unwrap();

        prop_assert!(!tampered.verify());
        prop_assert!(matches!(tampered.verify_signature(), Err(NostrError::InvalidEvent(_))));
    }

    /// A signature from one key never verifies under another.
    #[test]
    fn signature_bound_to_key(
        a in secret_key_strategy(),
        b in secret_key_strategy(),
        message in prop::array::uniform32(any::<u8>()),
    ) {
        prop_assume!(a != b);
        let signer = Keypair::from_secret_bytes(a).unwrap();
        let other = Keypair::from_secret_bytes(b).unwrap();

        let sig = signer.sign(&message).unwrap();
        prop_assert!(verify_signature(&signer.public_key(), &message, &sig));
        prop_assert!(!verify_signature(&other.public_key(), &message, &sig));
    }

    /// Flipping any bit of a signature breaks it.
    #[test]
    fn signature_bit_flip_detected(
        secret in secret_key_strategy(),
        message in prop::array::uniform32(any::<u8>()),
        index in 0usize..64,
        bit in 0u8..8,
    ) {
        let keys = Keypair::from_secret_bytes(secret).unwrap();
        let sig = keys.sign(&message).unwrap();

        let mut bytes = *sig.as_bytes();
        bytes[index] ^= 1 << bit;
        prop_assert!(!verify_signature(&keys.public_key(), &message, &Signature::from_bytes(bytes)));
    }

    /// Same secret bytes always produce the same public key.
    #[test]
    fn keypair_from_bytes_is_deterministic(secret in secret_key_strategy()) {
        let a = Keypair::from_secret_bytes(secret).unwrap();
        let b = Keypair::from_secret_bytes(secret).unwrap();
        prop_assert_eq!(a.public_key(), b.public_key());
    }

    /// Hex forms have fixed widths and parse back.
    #[test]
    fn hex_encodings_have_fixed_width(
        secret in secret_key_strategy(),
        message in prop::array::uniform32(any::<u8>()),
    ) {
        let keys = Keypair::from_secret_bytes(secret).unwrap();
        let pubkey_hex = keys.public_key().to_hex();
        let sig_hex = keys.sign(&message).unwrap().to_hex();

        prop_assert_eq!(pubkey_hex.len(), 64);
        prop_assert_eq!(sig_hex.len(), 128);
        prop_assert_eq!(PublicKey::from_hex(&pubkey_hex).unwrap(), keys.public_key());
        let exported = keys.export_secret_hex();
        prop_assert_eq!(exported.as_str(), hex::encode(secret));
    }

    /// Arbitrary strings never panic the parsers.
    #[test]
    fn parsers_reject_garbage(input in "\\PC{0,80}") {
        let _ = PublicKey::from_hex(&input);
        let _ = Signature::from_hex(&input);
        let _ = EventId::from_hex(&input);
        let _ = Keypair::from_secret_hex(&input);
        let _ = haven_protocol::nostr::Event::from_json(&input);
    }
}

mod edge_cases {
    use super::*;

    #[test]
    fn keypair_from_all_zeros_fails() {
        assert!(matches!(
            Keypair::from_secret_bytes([0u8; 32]),
            Err(NostrError::InvalidKey(_))
        ));
    }

    #[test]
    fn keypair_from_curve_order_fails() {
        let order =
            hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141").unwrap();
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&order);
        assert!(Keypair::from_secret_bytes(secret).is_err());
    }

    #[test]
    fn keypair_just_below_curve_order_succeeds() {
        let order_minus_one =
            hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140").unwrap();
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&order_minus_one);
        assert!(Keypair::from_secret_bytes(secret).is_ok());
    }

    #[test]
    fn public_key_off_curve_is_invalid() {
        // BIP-340 vector 5: not the x-coordinate of any curve point
        let key = PublicKey::from_hex(
            "eefdea4cdb677750a420fee807eacf21eb9898ae79b9768766e4faa04a2d4a34",
        )
        .unwrap();
        assert!(!key.is_valid_point());
    }

    #[test]
    fn signing_with_wrong_key_is_mismatch() {
        let (alice, bob) = helpers::alice_and_bob();
        let draft = helpers::note(&alice.keys, "mine");
        assert!(matches!(
            draft.sign(&bob.keys),
            Err(NostrError::KeyMismatch)
        ));
    }

    #[test]
    fn secret_never_in_debug_output() {
        let keys = helpers::scalar_keypair(7);
        let secret_hex = keys.export_secret_hex();
        let debug_output = format!("{keys:?}");
        assert!(!debug_output.contains(secret_hex.as_str()));
    }
}
