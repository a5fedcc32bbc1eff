use packlab::checksum::calculate_checksum;
use packlab::codec::{decompress, decompress_data, decompressed_len, ESCAPE};
use packlab::crypto::{decrypt, lfsr_step};
use packlab::floats::join_float_array;
use packlab::header::PackedHeader;
use proptest::prelude::*;

proptest! {
    #[test]
    fn decrypt_is_self_inverse(data in proptest::collection::vec(any::<u8>(), 0..512), key in any::<u16>()) {
        prop_assert_eq!(decrypt(&decrypt(&data, key), key), data);
    }

    #[test]
    fn decrypt_prefix_is_stable(data in proptest::collection::vec(any::<u8>(), 2..256), key in any::<u16>()) {
        // Keystream depends only on the key, so a shorter even prefix decrypts identically.
        let cut = data.len() / 2 * 2;
        let full = decrypt(&data, key);
        prop_assert_eq!(&decrypt(&data[..cut], key)[..], &full[..cut]);
    }

    #[test]
    fn literals_decompress_to_themselves(
        data in proptest::collection::vec(any::<u8>().prop_filter("no escape", |b| *b != ESCAPE), 0..512),
        dict in any::<[u8; 16]>(),
    ) {
        prop_assert_eq!(decompress(&data, &dict), data.clone());
        let mut out = vec![0u8; data.len()];
        prop_assert_eq!(decompress_data(&data, &mut out, &dict).unwrap(), data.len());
        prop_assert_eq!(out, data);
    }

    #[test]
    fn decompressed_len_matches_output(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        dict in any::<[u8; 16]>(),
    ) {
        prop_assert_eq!(decompress(&data, &dict).len(), decompressed_len(&data, &dict));
    }

    #[test]
    fn checksum_is_wrapping_sum(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let sum: u64 = data.iter().map(|&b| b as u64).sum();
        prop_assert_eq!(calculate_checksum(&data), (sum & 0xFFFF) as u16);
    }

    #[test]
    fn header_parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(h) = PackedHeader::parse(&data) {
            prop_assert!(h.header_len <= data.len());
            prop_assert_eq!(h.dictionary_data.is_some(), h.is_compressed);
            prop_assert_eq!(h.checksum_value.is_some(), h.is_checksummed);
        }
    }

    #[test]
    fn lfsr_never_reaches_zero(state in 1u16..) {
        prop_assert_ne!(lfsr_step(state), 0);
    }

    #[test]
    fn float_join_restores_bit_patterns(bits in proptest::collection::vec(any::<u32>(), 0..64)) {
        let mut signfrac = Vec::new();
        let mut exponent = Vec::new();
        for b in &bits {
            let le = b.to_le_bytes();
            signfrac.extend_from_slice(&[le[0], le[1], (le[2] & 0x7F) | (le[3] & 0x80)]);
            exponent.push((b >> 23) as u8);
        }
        let mut out = vec![0u8; bits.len() * 4];
        prop_assert_eq!(join_float_array(&signfrac, &exponent, &mut out).unwrap(), out.len());
        let expected: Vec<u8> = bits.iter().flat_map(|b| b.to_le_bytes()).collect();
        prop_assert_eq!(out, expected);
    }
}
