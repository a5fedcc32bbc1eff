//! Reassembly of IEEE-754 single-precision floats from split byte lanes.
//!
//! Output is always little-endian `f32` bit patterns, four bytes per value:
//!
//! ```text
//! byte 0   fraction bits  0..8
//! byte 1   fraction bits  8..16
//! byte 2   exponent bit 0 (bit 7) | fraction bits 16..23
//! byte 3   sign (bit 7)           | exponent bits 1..8
//! ```
//!
//! The 2-stream layout carries the sign in bit 7 of every third sign+fraction
//! byte.  The 3-stream layout carries it in a separate bit-packed lane,
//! least-significant bit first.

use crate::codec::CapacityError;

/// Bytes per output float.
pub const FLOAT_BYTES: usize = 4;
/// Sign+fraction (2-stream) or fraction (3-stream) bytes per float.
pub const FRACTION_BYTES: usize = 3;

/// Build the four output bytes from the three low bytes, sign and exponent.
#[inline]
fn assemble(frac: &[u8], exponent: u8, sign: bool) -> [u8; FLOAT_BYTES] {
    [
        frac[0],
        frac[1],
        (frac[2] & 0x7F) | ((exponent & 0x01) << 7),
        ((sign as u8) << 7) | (exponent >> 1),
    ]
}

/// Join a sign+fraction lane and an exponent lane into `output`.
///
/// The float count is `signfrac.len() / 3`; the exponent lane must supply
/// one byte for each of them.  Returns the number of bytes written.
pub fn join_float_array(
    signfrac: &[u8],
    exponent: &[u8],
    output:   &mut [u8],
) -> Result<usize, CapacityError> {
    let count = signfrac.len() / FRACTION_BYTES;
    CapacityError::check(count, exponent.len())?;
    CapacityError::check(count * FLOAT_BYTES, output.len())?;

    for ((sf, &exp), out) in signfrac
        .chunks_exact(FRACTION_BYTES)
        .zip(exponent)
        .zip(output.chunks_exact_mut(FLOAT_BYTES))
    {
        out.copy_from_slice(&assemble(sf, exp, sf[2] & 0x80 != 0));
    }
    Ok(count * FLOAT_BYTES)
}

/// Join separate fraction, exponent and sign lanes into `output`.
///
/// The float count is `frac.len() / 3`.  The sign lane holds one bit per
/// float: float `i` reads bit `i % 8` of byte `i / 8`.  Bit 7 of each third
/// fraction byte is ignored.  Returns the number of bytes written.
pub fn join_float_array_three_stream(
    frac:     &[u8],
    exponent: &[u8],
    sign:     &[u8],
    output:   &mut [u8],
) -> Result<usize, CapacityError> {
    let count = frac.len() / FRACTION_BYTES;
    CapacityError::check(count, exponent.len())?;
    CapacityError::check(sign_lane_len(count), sign.len())?;
    CapacityError::check(count * FLOAT_BYTES, output.len())?;

    for (i, ((f, &exp), out)) in frac
        .chunks_exact(FRACTION_BYTES)
        .zip(exponent)
        .zip(output.chunks_exact_mut(FLOAT_BYTES))
        .enumerate()
    {
        let negative = (sign[i / 8] >> (i % 8)) & 1 != 0;
        out.copy_from_slice(&assemble(f, exp, negative));
    }
    Ok(count * FLOAT_BYTES)
}

/// Bytes needed for a bit-packed sign lane of `count` floats.
pub fn sign_lane_len(count: usize) -> usize {
    count.div_ceil(8)
}

// ── Payload lane splitting ───────────────────────────────────────────────────

/// Split a 2-stream payload into `(signfrac, exponent)`.
///
/// The payload is three quarters sign+fraction followed by one quarter
/// exponent.  Returns `None` unless the length is a multiple of four.
pub fn split_two_stream(payload: &[u8]) -> Option<(&[u8], &[u8])> {
    if payload.len() % FLOAT_BYTES != 0 {
        return None;
    }
    Some(payload.split_at(payload.len() / FLOAT_BYTES * FRACTION_BYTES))
}

/// Split a 3-stream payload into `(frac, exponent, sign)`.
///
/// For `n` floats the payload is `3n` fraction bytes, `n` exponent bytes and
/// `ceil(n / 8)` sign bytes.  Returns `None` if no `n` fits exactly.
pub fn split_three_stream(payload: &[u8]) -> Option<(&[u8], &[u8], &[u8])> {
    // 4n + ceil(n/8) = len  =>  n is within one of 8 * len / 33.
    let estimate = payload.len() * 8 / 33;
    let count = (estimate.saturating_sub(1)..=estimate + 1)
        .find(|&n| n * FLOAT_BYTES + sign_lane_len(n) == payload.len())?;

    let (frac, rest) = payload.split_at(count * FRACTION_BYTES);
    let (exponent, sign) = rest.split_at(count);
    Some((frac, exponent, sign))
}
