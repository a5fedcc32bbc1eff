//! Packed-file header.
//!
//! # Layout
//! ```text
//! 0   3   magic + version   02 13 03
//! 3   1   flags             see FLAG_* constants
//! 4   8   orig_data_size    u64 LE
//! 12  8   data_size         u64 LE
//! 20  16  dictionary        present iff FLAG_COMPRESSED
//! ..  2   checksum          present iff FLAG_CHECKSUMMED, u16 **BE**
//! ```
//! Optional sections follow the fixed part in table order; each one is
//! present only when its flag is set, so its offset depends on the flags
//! before it.  The checksum is big-endian while every other integer is
//! little-endian; producers write it that way.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;
use thiserror::Error;

use crate::codec::{Dictionary, DICTIONARY_LENGTH};

pub const MAGIC: [u8; 3] = [0x02, 0x13, 0x03];

/// Size of the always-present part of the header.
pub const BASE_HEADER_LEN: usize = 20;
/// Size of the checksum section.
pub const CHECKSUM_LEN: usize = 2;

pub const FLAG_COMPRESSED:  u8 = 0x80;
pub const FLAG_ENCRYPTED:   u8 = 0x40;
pub const FLAG_CHECKSUMMED: u8 = 0x20;
pub const FLAG_CONTINUE:    u8 = 0x10;
pub const FLAG_FLOAT:       u8 = 0x08;
pub const FLAG_FLOAT3:      u8 = 0x04;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Header too short: need {needed} bytes, have {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("Invalid magic/version: {}", hex::encode(.0))]
    BadMagic([u8; 3]),
    #[error("Header declares {header_len} bytes but only {actual} are available")]
    Truncated { header_len: usize, actual: usize },
}

// ── Optional sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Dictionary,
    Checksum,
}

/// Optional sections in on-disk order: (section, gating flag, size).
const OPTIONAL_SECTIONS: [(Section, u8, usize); 2] = [
    (Section::Dictionary, FLAG_COMPRESSED,  DICTIONARY_LENGTH),
    (Section::Checksum,   FLAG_CHECKSUMMED, CHECKSUM_LEN),
];

/// Absolute offsets of the sections present under `flags`, plus the total
/// header length.
fn section_layout(flags: u8) -> (Vec<(Section, usize)>, usize) {
    let mut offset = BASE_HEADER_LEN;
    let mut present = Vec::with_capacity(OPTIONAL_SECTIONS.len());
    for &(section, flag, size) in &OPTIONAL_SECTIONS {
        if flags & flag != 0 {
            present.push((section, offset));
            offset += size;
        }
    }
    (present, offset)
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Parsed header of one packed segment.  Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackedHeader {
    pub flags:           u8,
    pub is_compressed:   bool,
    pub is_encrypted:    bool,
    pub is_checksummed:  bool,
    pub should_continue: bool,
    pub should_float:    bool,
    pub should_float3:   bool,
    /// Size of the fully decoded payload.
    pub orig_data_size:  u64,
    /// Size of the stored payload following the header.
    pub data_size:       u64,
    pub header_len:      usize,
    #[serde(serialize_with = "hex_bytes")]
    pub dictionary_data: Option<Dictionary>,
    pub checksum_value:  Option<u16>,
}

fn hex_bytes<S: serde::Serializer>(d: &Option<Dictionary>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(bytes) => s.serialize_some(&hex::encode(bytes)),
        None        => s.serialize_none(),
    }
}

impl PackedHeader {
    /// Parse the header at the start of `input`.
    ///
    /// Stops at the first failing check: length, magic, then the length
    /// implied by the flags.
    pub fn parse(input: &[u8]) -> Result<Self, HeaderError> {
        if input.len() < BASE_HEADER_LEN {
            return Err(HeaderError::TooShort { needed: BASE_HEADER_LEN, actual: input.len() });
        }
        let magic = [input[0], input[1], input[2]];
        if magic != MAGIC {
            return Err(HeaderError::BadMagic(magic));
        }
        let flags = input[3];

        let orig_data_size = LittleEndian::read_u64(&input[4..12]);
        let data_size      = LittleEndian::read_u64(&input[12..20]);

        let (sections, header_len) = section_layout(flags);
        if input.len() < header_len {
            return Err(HeaderError::Truncated { header_len, actual: input.len() });
        }

        let mut dictionary_data = None;
        let mut checksum_value  = None;
        for (section, offset) in sections {
            match section {
                Section::Dictionary => {
                    let mut dict = [0u8; DICTIONARY_LENGTH];
                    dict.copy_from_slice(&input[offset..offset + DICTIONARY_LENGTH]);
                    dictionary_data = Some(dict);
                }
                Section::Checksum => {
                    checksum_value = Some(BigEndian::read_u16(&input[offset..offset + CHECKSUM_LEN]));
                }
            }
        }

        Ok(Self {
            flags,
            is_compressed:   flags & FLAG_COMPRESSED  != 0,
            is_encrypted:    flags & FLAG_ENCRYPTED   != 0,
            is_checksummed:  flags & FLAG_CHECKSUMMED != 0,
            should_continue: flags & FLAG_CONTINUE    != 0,
            should_float:    flags & FLAG_FLOAT       != 0,
            should_float3:   flags & FLAG_FLOAT3      != 0,
            orig_data_size,
            data_size,
            header_len,
            dictionary_data,
            checksum_value,
        })
    }

    /// Byte length of the header that `flags` implies.
    pub fn header_len_for(flags: u8) -> usize {
        section_layout(flags).1
    }
}

/// Boolean view of [`PackedHeader::parse`]: true iff `input` starts with a
/// complete, well-formed header.
pub fn is_valid_header(input: &[u8]) -> bool {
    PackedHeader::parse(input).is_ok()
}
