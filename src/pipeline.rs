//! Decode pipeline: header, then the stages the flags select.
//!
//! # Stage order
//! Stages always run in this order, each one only when its flag is set:
//!
//! 1. decrypt            (`is_encrypted`)
//! 2. decompress         (`is_compressed`)
//! 3. verify checksum    (`is_checksummed`)
//! 4. join float lanes   (`should_float3`, else `should_float`)
//!
//! The checksum covers the payload exactly as stored in the file, so it can
//! be computed before or after the other stages; its result is recorded at
//! stage 3.  A mismatch is reported in [`SegmentReport::checksum`] and the
//! decoded bytes are still returned, unless `strict_checksum` is set.
//!
//! # Segments
//! A segment whose continue flag is set is followed immediately by another
//! complete segment (header + payload).  [`unpack`] decodes the whole chain
//! and concatenates the outputs.

use std::io;

use thiserror::Error;

use crate::checksum::calculate_checksum;
use crate::codec::{decompress_data, decompressed_len, CapacityError};
use crate::crypto::{decrypt_data, DEFAULT_SEED};
use crate::floats::{
    join_float_array, join_float_array_three_stream, sign_lane_len, split_three_stream,
    split_two_stream, FLOAT_BYTES,
};
use crate::header::{HeaderError, PackedHeader};

/// Default ceiling for `orig_data_size`: 1 GiB.
pub const DEFAULT_MAX_OUTPUT_SIZE: u64 = 1 << 30;

// ── Options ──────────────────────────────────────────────────────────────────

/// Configuration for [`unpack`].
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// LFSR seed for encrypted segments.
    pub key:              u16,
    pub verify_checksum:  bool,
    /// Turn a checksum mismatch into [`UnpackError::ChecksumMismatch`].
    pub strict_checksum:  bool,
    /// Largest `orig_data_size` a header may declare before decoding refuses
    /// to allocate for it.
    pub max_output_size:  u64,
    /// Decode chained segments; when false only the first one is decoded.
    pub follow_segments:  bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            key:             DEFAULT_SEED,
            verify_checksum: true,
            strict_checksum: false,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            follow_segments: true,
        }
    }
}

// ── Errors and reports ───────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum UnpackError {
    #[error("Invalid header at offset {offset}: {source}")]
    Header { offset: usize, source: HeaderError },
    #[error("Payload truncated: header declares {declared} bytes, {available} available")]
    PayloadTruncated { declared: u64, available: usize },
    #[error("Declared output size {declared} exceeds limit {limit}")]
    OutputTooLarge { declared: u64, limit: u64 },
    #[error("Checksum mismatch: header {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },
    #[error("Continue flag set but no segment follows at offset {offset}")]
    MissingSegment { offset: usize },
    #[error("Float payload of {len} bytes does not split into whole lanes")]
    FloatLanes { len: usize },
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Segment carries no checksum.
    NotPresent,
    /// Segment carries one but verification was disabled.
    Skipped,
    Verified,
    Mismatch { expected: u16, computed: u16 },
}

impl ChecksumStatus {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, ChecksumStatus::Mismatch { .. })
    }
}

/// What happened to one segment.
#[derive(Debug, Clone)]
pub struct SegmentReport {
    /// Offset of the segment header within the whole input.
    pub offset:     usize,
    pub header:     PackedHeader,
    pub checksum:   ChecksumStatus,
    /// Bytes this segment contributed to the output.
    pub output_len: usize,
}

/// Result of a full decode.
#[derive(Debug, Clone)]
pub struct Unpacked {
    pub data:     Vec<u8>,
    pub segments: Vec<SegmentReport>,
}

impl Unpacked {
    /// True unless some segment's checksum failed.
    pub fn is_verified(&self) -> bool {
        !self.segments.iter().any(|s| s.checksum.is_mismatch())
    }
}

// ── Stages ───────────────────────────────────────────────────────────────────

/// Working state for one segment as it moves through the stages.
pub struct SegmentState<'a> {
    pub header:   &'a PackedHeader,
    /// Payload exactly as stored.
    pub stored:   &'a [u8],
    /// Output of the last stage that ran.
    pub data:     Vec<u8>,
    pub checksum: ChecksumStatus,
}

/// One optional transform in the decode pipeline.
pub trait Stage {
    fn name(&self) -> &'static str;
    fn applies(&self, header: &PackedHeader) -> bool;
    fn apply(&self, state: &mut SegmentState<'_>) -> Result<(), UnpackError>;
}

pub struct DecryptStage {
    pub key: u16,
}

impl Stage for DecryptStage {
    fn name(&self) -> &'static str { "decrypt" }
    fn applies(&self, h: &PackedHeader) -> bool { h.is_encrypted }
    fn apply(&self, state: &mut SegmentState<'_>) -> Result<(), UnpackError> {
        let mut out = vec![0u8; state.data.len()];
        decrypt_data(&state.data, &mut out, self.key)?;
        state.data = out;
        Ok(())
    }
}

pub struct DecompressStage;

impl Stage for DecompressStage {
    fn name(&self) -> &'static str { "decompress" }
    fn applies(&self, h: &PackedHeader) -> bool { h.is_compressed }
    fn apply(&self, state: &mut SegmentState<'_>) -> Result<(), UnpackError> {
        let Some(dictionary) = state.header.dictionary_data.as_ref() else {
            return Ok(());
        };
        let capacity = lane_capacity(state.header)?;
        let needed = decompressed_len(&state.data, dictionary);
        if needed > capacity {
            return Err(CapacityError { needed, available: capacity }.into());
        }
        if needed != capacity {
            tracing::warn!(
                "Decompressed {} bytes, header implies {}",
                needed,
                capacity
            );
        }
        let mut out = vec![0u8; needed];
        decompress_data(&state.data, &mut out, dictionary)?;
        state.data = out;
        Ok(())
    }
}

pub struct ChecksumStage {
    pub strict: bool,
}

impl Stage for ChecksumStage {
    fn name(&self) -> &'static str { "verify-checksum" }
    fn applies(&self, h: &PackedHeader) -> bool { h.is_checksummed }
    fn apply(&self, state: &mut SegmentState<'_>) -> Result<(), UnpackError> {
        let Some(expected) = state.header.checksum_value else {
            return Ok(());
        };
        let computed = calculate_checksum(state.stored);
        if computed == expected {
            state.checksum = ChecksumStatus::Verified;
            return Ok(());
        }
        if self.strict {
            return Err(UnpackError::ChecksumMismatch { expected, computed });
        }
        tracing::warn!(
            "Checksum mismatch: header {:#06x}, computed {:#06x}",
            expected,
            computed
        );
        state.checksum = ChecksumStatus::Mismatch { expected, computed };
        Ok(())
    }
}

pub struct FloatStage;

impl Stage for FloatStage {
    fn name(&self) -> &'static str { "join-floats" }
    fn applies(&self, h: &PackedHeader) -> bool { h.should_float && !h.should_float3 }
    fn apply(&self, state: &mut SegmentState<'_>) -> Result<(), UnpackError> {
        let len = state.data.len();
        let (signfrac, exponent) = split_two_stream(&state.data)
            .ok_or(UnpackError::FloatLanes { len })?;
        let mut out = vec![0u8; len];
        join_float_array(signfrac, exponent, &mut out)?;
        state.data = out;
        Ok(())
    }
}

pub struct Float3Stage;

impl Stage for Float3Stage {
    fn name(&self) -> &'static str { "join-floats3" }
    fn applies(&self, h: &PackedHeader) -> bool { h.should_float3 }
    fn apply(&self, state: &mut SegmentState<'_>) -> Result<(), UnpackError> {
        let len = state.data.len();
        let (frac, exponent, sign) = split_three_stream(&state.data)
            .ok_or(UnpackError::FloatLanes { len })?;
        let mut out = vec![0u8; exponent.len() * FLOAT_BYTES];
        join_float_array_three_stream(frac, exponent, sign, &mut out)?;
        state.data = out;
        Ok(())
    }
}

/// All stages in pipeline order, configured from `opts`.
pub fn stages(opts: &UnpackOptions) -> Vec<Box<dyn Stage>> {
    let mut out: Vec<Box<dyn Stage>> = vec![
        Box::new(DecryptStage { key: opts.key }),
        Box::new(DecompressStage),
    ];
    if opts.verify_checksum {
        out.push(Box::new(ChecksumStage { strict: opts.strict_checksum }));
    }
    out.push(Box::new(FloatStage));
    out.push(Box::new(Float3Stage));
    out
}

/// Most bytes the decompressor may produce: the final output size, plus the
/// sign lane that 3-stream reassembly consumes.
///
/// A size that does not fit in `usize` is [`UnpackError::OutputTooLarge`].
fn lane_capacity(header: &PackedHeader) -> Result<usize, UnpackError> {
    let too_large = UnpackError::OutputTooLarge {
        declared: header.orig_data_size,
        limit:    usize::MAX as u64,
    };
    let Ok(orig) = usize::try_from(header.orig_data_size) else {
        return Err(too_large);
    };
    if !header.should_float3 {
        return Ok(orig);
    }
    orig.checked_add(sign_lane_len(orig / FLOAT_BYTES)).ok_or(too_large)
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Parse the header at `offset` and locate its payload.
///
/// Returns the header and the stored payload slice.
fn locate_segment(input: &[u8], offset: usize) -> Result<(PackedHeader, &[u8]), UnpackError> {
    let segment = &input[offset.min(input.len())..];
    let header = PackedHeader::parse(segment)
        .map_err(|source| UnpackError::Header { offset, source })?;

    let available = segment.len() - header.header_len;
    let data_size = usize::try_from(header.data_size)
        .ok()
        .filter(|&n| n <= available)
        .ok_or(UnpackError::PayloadTruncated { declared: header.data_size, available })?;

    let start = header.header_len;
    Ok((header, &segment[start..start + data_size]))
}

/// Decode the single segment starting at `offset` in `input`.
///
/// Returns the segment's output and report, plus the offset just past it.
pub fn unpack_segment(
    input:  &[u8],
    offset: usize,
    opts:   &UnpackOptions,
) -> Result<(Vec<u8>, SegmentReport, usize), UnpackError> {
    let (header, stored) = locate_segment(input, offset)?;
    if header.orig_data_size > opts.max_output_size {
        return Err(UnpackError::OutputTooLarge {
            declared: header.orig_data_size,
            limit:    opts.max_output_size,
        });
    }
    tracing::debug!(
        "Segment at {}: flags {:#04x}, header {} B, stored {} B, original {} B",
        offset,
        header.flags,
        header.header_len,
        stored.len(),
        header.orig_data_size
    );

    let mut state = SegmentState {
        header:   &header,
        stored,
        data:     stored.to_vec(),
        checksum: if header.is_checksummed { ChecksumStatus::Skipped } else { ChecksumStatus::NotPresent },
    };
    for stage in stages(opts).iter().filter(|s| s.applies(&header)) {
        let before = state.data.len();
        stage.apply(&mut state)?;
        tracing::debug!("  {}: {} -> {} bytes", stage.name(), before, state.data.len());
    }

    let next = offset + header.header_len + stored.len();
    let SegmentState { data, checksum, .. } = state;
    let report = SegmentReport {
        offset,
        checksum,
        output_len: data.len(),
        header,
    };
    Ok((data, report, next))
}

/// Decode a complete packed buffer, following chained segments.
pub fn unpack(input: &[u8], opts: &UnpackOptions) -> Result<Unpacked, UnpackError> {
    let mut data = Vec::new();
    let mut segments = Vec::new();
    let mut offset = 0usize;

    loop {
        let (out, report, next) = unpack_segment(input, offset, opts)?;
        let more = report.header.should_continue;
        data.extend_from_slice(&out);
        segments.push(report);

        if !more || !opts.follow_segments {
            break;
        }
        if next >= input.len() {
            return Err(UnpackError::MissingSegment { offset: next });
        }
        offset = next;
    }

    Ok(Unpacked { data, segments })
}

/// Parse every segment header in the chain without decoding payloads.
///
/// Returns `(offset, header)` pairs in file order.
pub fn segment_headers(input: &[u8]) -> Result<Vec<(usize, PackedHeader)>, UnpackError> {
    let mut headers = Vec::new();
    let mut offset = 0usize;
    loop {
        let (header, stored) = locate_segment(input, offset)?;
        let next = offset + header.header_len + stored.len();
        let more = header.should_continue;
        headers.push((offset, header));
        if !more {
            break;
        }
        if next >= input.len() {
            return Err(UnpackError::MissingSegment { offset: next });
        }
        offset = next;
    }
    Ok(headers)
}
