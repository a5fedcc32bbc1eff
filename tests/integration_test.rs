use packlab::archive::PackedFile;
use packlab::checksum::calculate_checksum;
use packlab::crypto::decrypt;
use packlab::header::{
    FLAG_CHECKSUMMED, FLAG_COMPRESSED, FLAG_CONTINUE, FLAG_ENCRYPTED, FLAG_FLOAT, FLAG_FLOAT3,
};
use packlab::pipeline::{unpack, ChecksumStatus, UnpackError, UnpackOptions};
use std::fs;
use tempfile::NamedTempFile;

const DICT: [u8; 16] = [
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37,
    0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F,
];

/// Build one segment the way a producer would.  `body` is already
/// compressed if the flag says so; it is encrypted next, and the checksum
/// is taken over the resulting stored bytes.
fn pack(flags: u8, orig_size: u64, body: &[u8], key: u16) -> Vec<u8> {
    let stored = if flags & FLAG_ENCRYPTED != 0 { decrypt(body, key) } else { body.to_vec() };

    let mut out = vec![0x02, 0x13, 0x03, flags];
    out.extend_from_slice(&orig_size.to_le_bytes());
    out.extend_from_slice(&(stored.len() as u64).to_le_bytes());
    if flags & FLAG_COMPRESSED != 0 {
        out.extend_from_slice(&DICT);
    }
    if flags & FLAG_CHECKSUMMED != 0 {
        out.extend_from_slice(&calculate_checksum(&stored).to_be_bytes());
    }
    out.extend_from_slice(&stored);
    out
}

fn float_lanes(values: &[f32]) -> Vec<u8> {
    let mut signfrac = Vec::new();
    let mut exponent = Vec::new();
    for v in values {
        let b = v.to_bits().to_le_bytes();
        signfrac.extend_from_slice(&[b[0], b[1], (b[2] & 0x7F) | (b[3] & 0x80)]);
        exponent.push((b[3] << 1) | (b[2] >> 7));
    }
    signfrac.extend(exponent);
    signfrac
}

fn float_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn test_unpack_file_roundtrip() {
    let input = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();

    let flags = FLAG_COMPRESSED | FLAG_ENCRYPTED | FLAG_CHECKSUMMED;
    // "AB" + five '5's (07 55 -> count 5, index 5) + escaped 07 + "C"
    let body = [0x41, 0x42, 0x07, 0x55, 0x07, 0x00, 0x43];
    fs::write(input.path(), pack(flags, 9, &body, 0x1337)).unwrap();

    let packed = PackedFile::open(input.path()).unwrap();
    let result = packed.unpack_to(output.path(), &UnpackOptions::default()).unwrap();

    let expected: [u8; 9] = [0x41, 0x42, 0x35, 0x35, 0x35, 0x35, 0x35, 0x07, 0x43];
    assert_eq!(result.data, expected);
    assert!(result.is_verified());
    assert_eq!(fs::read(output.path()).unwrap(), expected);
}

#[test]
fn test_every_transform_flag_combination() {
    let plain = b"plain bytes with no escape marker".to_vec();
    for flags in 0u8..8 {
        let flags = flags << 5; // compressed, encrypted, checksummed
        let packed = pack(flags, plain.len() as u64, &plain, 0xACE1);
        let opts = UnpackOptions { key: 0xACE1, strict_checksum: true, ..Default::default() };
        let out = unpack(&packed, &opts).unwrap_or_else(|e| panic!("flags {flags:#04x}: {e}"));
        assert_eq!(out.data, plain, "flags {flags:#04x}");
        let expected_status = if flags & FLAG_CHECKSUMMED != 0 {
            ChecksumStatus::Verified
        } else {
            ChecksumStatus::NotPresent
        };
        assert_eq!(out.segments[0].checksum, expected_status);
    }
}

#[test]
fn test_corrupted_payload_is_flagged() {
    let mut packed = pack(FLAG_CHECKSUMMED | FLAG_ENCRYPTED, 4, b"data", 0x1337);
    let last = packed.len() - 1;
    packed[last] ^= 0x01;

    let out = unpack(&packed, &UnpackOptions::default()).unwrap();
    assert!(!out.is_verified());
    assert_ne!(out.data, b"data");
}

#[test]
fn test_two_stream_float_file() {
    let values = [300.0f32, -1.5, 0.15625, f32::MIN_POSITIVE, -0.0];
    let lanes = float_lanes(&values);
    let packed = pack(FLAG_FLOAT | FLAG_ENCRYPTED, lanes.len() as u64, &lanes, 0x1337);
    let out = unpack(&packed, &UnpackOptions::default()).unwrap();
    assert_eq!(out.data, float_bytes(&values));
}

#[test]
fn test_three_stream_float_file() {
    let values = [1.0f32, -2.0, 3.5, -4.75, 5.0, 6.0, -7.0, 8.0, -9.0];
    let mut frac = Vec::new();
    let mut exp = Vec::new();
    let mut sign = vec![0u8; 2];
    for (i, v) in values.iter().enumerate() {
        let bits = v.to_bits();
        let b = bits.to_le_bytes();
        frac.extend_from_slice(&[b[0], b[1], b[2] & 0x7F]);
        exp.push((bits >> 23) as u8);
        if bits >> 31 == 1 {
            sign[i / 8] |= 1 << (i % 8);
        }
    }
    let mut body = frac;
    body.extend(exp);
    body.extend(sign);

    let packed = pack(FLAG_FLOAT3 | FLAG_CHECKSUMMED, (values.len() * 4) as u64, &body, 0);
    let out = unpack(&packed, &UnpackOptions::default()).unwrap();
    assert_eq!(out.data, float_bytes(&values));
    assert!(out.is_verified());
}

#[test]
fn test_chained_segments_on_disk() {
    let file = NamedTempFile::new().unwrap();
    let mut bytes = pack(FLAG_CONTINUE | FLAG_COMPRESSED, 4, &[0x07, 0x41], 0);
    bytes.extend(pack(FLAG_CONTINUE | FLAG_ENCRYPTED, 3, b"xyz", 0x1337));
    bytes.extend(pack(FLAG_CHECKSUMMED, 2, b"!!", 0));
    fs::write(file.path(), &bytes).unwrap();

    let packed = PackedFile::open(file.path()).unwrap();
    let headers = packed.headers().unwrap();
    assert_eq!(headers.len(), 3);
    assert_eq!(headers[0].0, 0);
    assert_eq!(headers[1].0, 36 + 2);
    assert!(headers[2].1.is_checksummed);

    let out = packed.unpack(&UnpackOptions::default()).unwrap();
    assert_eq!(out.data, b"1111xyz!!");
    assert_eq!(out.segments.iter().map(|s| s.output_len).collect::<Vec<_>>(), vec![4, 3, 2]);
}

#[test]
fn test_invalid_file_writes_nothing() {
    let input = NamedTempFile::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out.bin");
    fs::write(input.path(), [0x02, 0x13, 0x04, 0x00]).unwrap();

    let packed = PackedFile::open(input.path()).unwrap();
    let err = packed.unpack_to(&dest, &UnpackOptions::default()).unwrap_err();
    assert!(matches!(err, UnpackError::Header { offset: 0, .. }));
    assert!(!dest.exists());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        PackedFile::open(dir.path().join("absent.packed")),
        Err(UnpackError::Io(_))
    ));
}
