/// Additive 16-bit checksum: the sum of every byte, wrapping at 2^16.
///
/// This is not a CRC; reordering the input does not change the result.
pub fn calculate_checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}
