//! Dictionary run-length decompression.
//!
//! # Escape encoding
//! Byte `0x07` is the only escape marker.  What follows it decides the
//! meaning of the pair:
//!
//! | Input | Output |
//! |-------|--------|
//! | `07` at end of input | literal `07` |
//! | `07 00` | literal `07` |
//! | `07 XY` (XY != 0) | `dictionary[Y]` repeated `X` times |
//! | any other byte | copied through |
//!
//! A repeat count of zero (`07 0Y`, Y != 0) consumes two input bytes and
//! emits nothing.

use thiserror::Error;

/// Byte that introduces a literal-escape or a dictionary run.
pub const ESCAPE: u8 = 0x07;

/// Number of entries in a decompression dictionary.
pub const DICTIONARY_LENGTH: usize = 16;

/// Literal-byte lookup table addressed by the low nibble of a run byte.
pub type Dictionary = [u8; DICTIONARY_LENGTH];

// ── Error type ───────────────────────────────────────────────────────────────

/// An output buffer was too small for the data a transform produces.
///
/// Transforms check capacity before writing past the end; a buffer is never
/// filled partially and then reported as complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Output buffer too small: need {needed} bytes, have {available}")]
pub struct CapacityError {
    pub needed:    usize,
    pub available: usize,
}

impl CapacityError {
    pub(crate) fn check(needed: usize, available: usize) -> Result<(), CapacityError> {
        if needed > available {
            Err(CapacityError { needed, available })
        } else {
            Ok(())
        }
    }
}

// ── Token stream ─────────────────────────────────────────────────────────────

/// One decoded unit of the compressed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(u8),
    Run { byte: u8, count: usize },
}

impl Token {
    fn len(self) -> usize {
        match self {
            Token::Literal(_)        => 1,
            Token::Run { count, .. } => count,
        }
    }
}

/// Walk the compressed input and yield tokens.  Never fails: every byte
/// sequence is a valid stream.
fn tokens<'a>(input: &'a [u8], dictionary: &'a Dictionary) -> impl Iterator<Item = Token> + 'a {
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        let b = *input.get(pos)?;
        if b != ESCAPE {
            pos += 1;
            return Some(Token::Literal(b));
        }
        match input.get(pos + 1).copied() {
            None | Some(0x00) => {
                pos += 2;
                Some(Token::Literal(ESCAPE))
            }
            Some(run) => {
                pos += 2;
                Some(Token::Run {
                    byte:  dictionary[(run & 0x0F) as usize],
                    count: (run >> 4) as usize,
                })
            }
        }
    })
}

/// Number of bytes `input` expands to.
pub fn decompressed_len(input: &[u8], dictionary: &Dictionary) -> usize {
    tokens(input, dictionary).map(Token::len).sum()
}

/// Expand `input` into `output`, returning the number of bytes written.
///
/// `output` may be larger than needed.  If it is too small nothing is
/// written and the exact requirement is reported.
pub fn decompress_data(
    input:      &[u8],
    output:     &mut [u8],
    dictionary: &Dictionary,
) -> Result<usize, CapacityError> {
    CapacityError::check(decompressed_len(input, dictionary), output.len())?;

    let mut written = 0usize;
    for token in tokens(input, dictionary) {
        match token {
            Token::Literal(b) => {
                output[written] = b;
                written += 1;
            }
            Token::Run { byte, count } => {
                output[written..written + count].fill(byte);
                written += count;
            }
        }
    }
    Ok(written)
}

/// Allocating form of [`decompress_data`].
pub fn decompress(input: &[u8], dictionary: &Dictionary) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for token in tokens(input, dictionary) {
        match token {
            Token::Literal(b)          => out.push(b),
            Token::Run { byte, count } => out.extend(std::iter::repeat(byte).take(count)),
        }
    }
    out
}
