//! Bit packing between cell states and key bytes.
//!
//! Bit `i` of the input lands in bit `i % 8` of byte `i / 8`
//! (least-significant bit first). Encryption and decryption both rely on
//! this order being reproduced exactly.

use cellcrypt_common::{Error, Result};

/// Number of bytes needed to hold `bits` bits.
pub fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Pack booleans into bytes, LSB-first.
///
/// # Postconditions
/// - Output length is `ceil(bits.len() / 8)`
/// - Unused high bits of the final byte are zero
pub fn pack(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; byte_len(bits.len())];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Pack only the first `n_bits` booleans.
///
/// # Errors
/// - `InsufficientBits` if `n_bits > bits.len()`
pub fn pack_truncated(bits: &[bool], n_bits: usize) -> Result<Vec<u8>> {
    if n_bits > bits.len() {
        return Err(Error::InsufficientBits {
            requested: n_bits,
            available: bits.len(),
        });
    }
    Ok(pack(&bits[..n_bits]))
}

/// Expand bytes into `8 * bytes.len()` booleans, LSB-first.
pub fn unpack(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
        .collect()
}
