//! Payload masking (RFC 6455 §5.3).
//!
//! Client-to-server payloads are XORed with a random 4-byte key. The same
//! operation unmasks, so one helper covers both directions.

/// XOR `data` in place with `mask[i % 4]`.
///
/// Processes eight bytes at a time with a rotated 64-bit key, then
/// finishes the tail byte-wise.
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let mask_u64 = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let word = u64::from_ne_bytes(word) ^ mask_u64;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }

    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}
