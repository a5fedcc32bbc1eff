//! LFSR stream-cipher decryption for packed payloads.
//!
//! The keystream is the sequence of LFSR states following the key.  Each
//! state covers two payload bytes: low byte first, then high byte.  A
//! trailing odd byte reuses the low byte of the last state produced, without
//! stepping again.
//!
//! XOR with a key-determined keystream is its own inverse, so
//! [`decrypt_data`] also serves as the encryption function.

pub mod lfsr;

pub use lfsr::{lfsr_step, Keystream, DEFAULT_SEED};

use crate::codec::CapacityError;

/// Decrypt `input` into `output` using `key` as the LFSR seed.
///
/// `output` must hold at least `input.len()` bytes; anything past that is
/// left untouched.  A one-byte input has no preceding pair, so it is XORed
/// with the low byte of the key itself.
pub fn decrypt_data(input: &[u8], output: &mut [u8], key: u16) -> Result<(), CapacityError> {
    CapacityError::check(input.len(), output.len())?;
    xor_keystream(input, output, key);
    Ok(())
}

/// Allocating form of [`decrypt_data`].
pub fn decrypt(input: &[u8], key: u16) -> Vec<u8> {
    let mut out = vec![0u8; input.len()];
    xor_keystream(input, &mut out, key);
    out
}

/// XOR `input` into the front of `output`, which must be at least as long.
fn xor_keystream(input: &[u8], output: &mut [u8], key: u16) {
    let mut keystream = Keystream::new(key);
    let mut pairs_in  = input.chunks_exact(2);
    let mut pairs_out = output.chunks_exact_mut(2);

    for (src, dst) in (&mut pairs_in).zip(&mut pairs_out) {
        let [lo, hi] = keystream.next().unwrap_or_default().to_le_bytes();
        dst[0] = src[0] ^ lo;
        dst[1] = src[1] ^ hi;
    }

    if let [last] = pairs_in.remainder() {
        let lo = keystream.current().to_le_bytes()[0];
        output[input.len() - 1] = last ^ lo;
    }
}
