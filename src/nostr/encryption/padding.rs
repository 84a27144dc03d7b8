//! Length-hiding padding for v2 payloads.
//!
//! Padded layout: `u16_be(len) ‖ plaintext ‖ zeros`, where the total after
//! the prefix is [`calc_padded_len`]`(len)`.

use zeroize::Zeroizing;

use crate::nostr::error::{NostrError, Result};

/// Smallest plaintext accepted, in bytes.
pub const MIN_PLAINTEXT_SIZE: usize = 1;

/// Largest plaintext accepted, in bytes.
pub const MAX_PLAINTEXT_SIZE: usize = 65_535;

/// Returns the padded length for a plaintext of `unpadded_len` bytes.
///
/// Up to 32 bytes everything pads to 32. Beyond that the length is rounded
/// up to a chunk of 32 bytes while the next power of two is at most 256,
/// and to an eighth of the next power of two after that.
///
/// # Example
///
/// ```
/// use haven_protocol::nostr::encryption::calc_padded_len;
///
/// assert_eq!(calc_padded_len(1), 32);
/// assert_eq!(calc_padded_len(33), 64);
/// assert_eq!(calc_padded_len(257), 320);
/// ```
#[must_use]
pub const fn calc_padded_len(unpadded_len: usize) -> usize {
    if unpadded_len <= 32 {
        return 32;
    }

    let next_power = 1usize << (usize::BITS - (unpadded_len - 1).leading_zeros());
    let chunk = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * ((unpadded_len - 1) / chunk + 1)
}

/// Checks a plaintext length against the accepted range.
pub(crate) fn check_plaintext_len(len: usize) -> Result<()> {
    if (MIN_PLAINTEXT_SIZE..=MAX_PLAINTEXT_SIZE).contains(&len) {
        Ok(())
    } else {
        Err(NostrError::InvalidPlaintextLength(len))
    }
}

/// Prefixes the plaintext with its length and zero-fills to the bucket size.
pub(crate) fn pad(plaintext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    check_plaintext_len(plaintext.len())?;
    let prefix = u16::try_from(plaintext.len())
        .map_err(|_| NostrError::InvalidPlaintextLength(plaintext.len()))?;

    let total = 2 + calc_padded_len(plaintext.len());
    let mut padded = Zeroizing::new(Vec::with_capacity(total));
    padded.extend_from_slice(&prefix.to_be_bytes());
    padded.extend_from_slice(plaintext);
    padded.resize(total, 0);
    Ok(padded)
}

/// Strips padding, rejecting buffers whose length prefix is inconsistent.
pub(crate) fn unpad(padded: &[u8]) -> Result<&[u8]> {
    let [hi, lo, rest @ ..] = padded else {
        return Err(NostrError::DecryptionFailed);
    };

    let len = usize::from(u16::from_be_bytes([*hi, *lo]));
    if len == 0 || rest.len() != calc_padded_len(len) {
        return Err(NostrError::DecryptionFailed);
    }

    Ok(&rest[..len])
}
