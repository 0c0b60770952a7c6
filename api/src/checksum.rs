// Licensed under the Apache-2.0 license

//! Message checksum.
//!
//! The checksum is the XOR of every little-endian 32-bit word that precedes
//! the checksum word. Bytes that do not fill a final word are zero padded.

/// Calculate the checksum of `data`
pub fn calc_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |acc, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        acc ^ u32::from_le_bytes(word)
    })
}

/// Verify checksum
pub fn verify_checksum(checksum: u32, data: &[u8]) -> bool {
    calc_checksum(data) == checksum
}

/// Write the checksum of `msg[..len - 4]` into the trailing word of `msg`.
///
/// Messages shorter than one word are left untouched.
pub fn populate_checksum(msg: &mut [u8]) {
    let Some(body_len) = msg.len().checked_sub(4) else {
        return;
    };
    let checksum = calc_checksum(&msg[..body_len]);
    msg[body_len..].copy_from_slice(&checksum.to_le_bytes());
}

/// Check the trailing checksum word of `msg`.
///
/// Returns `Err((expected, actual))` on mismatch, where `expected` is the
/// value computed over the body and `actual` is the value carried in `msg`.
pub fn verify_trailing_checksum(msg: &[u8]) -> Result<(), (u32, u32)> {
    let Some(body_len) = msg.len().checked_sub(4) else {
        return Err((0, 0));
    };
    let mut carried = [0u8; 4];
    carried.copy_from_slice(&msg[body_len..]);
    let actual = u32::from_le_bytes(carried);
    let expected = calc_checksum(&msg[..body_len]);
    if expected == actual {
        Ok(())
    } else {
        Err((expected, actual))
    }
}
