//! Bit packing for spans of odd-width fields.
//!
//! A span is written MSB-first: the first field's bits are the most
//! significant, and the trailing bits of the last byte are zero.

/// Number of whole bytes needed to hold `bits`.
pub fn bytes_for_bits(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Mask with the low `width` bits set (`width` up to 64).
pub fn mask_for(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Reads the bit at `bit_pos` (0 = MSB of the first byte), or `None` past the end.
fn read_bit_at(data: &[u8], bit_pos: usize) -> Option<u8> {
    data.get(bit_pos / 8).map(|b| (b >> (7 - bit_pos % 8)) & 1)
}

/// Pack `(value, width)` pairs into `ceil(sum(width) / 8)` bytes, big-endian.
/// Values wider than their field are masked.
pub fn pack_span(fields: &[(u64, u32)]) -> Vec<u8> {
    let total: usize = fields.iter().map(|&(_, w)| w as usize).sum();
    let mut out = vec![0u8; bytes_for_bits(total)];
    let mut pos = 0usize;
    for &(value, width) in fields {
        let value = value & mask_for(width);
        for i in (0..width).rev() {
            if (value >> i) & 1 != 0 {
                out[pos / 8] |= 1 << (7 - pos % 8);
            }
            pos += 1;
        }
    }
    out
}

/// Inverse of [`pack_span`]: slice `data` into one value per width, in order.
/// Returns `None` if `data` holds fewer than `sum(widths)` bits.
pub fn unpack_span(data: &[u8], widths: &[u32]) -> Option<Vec<u64>> {
    let mut pos = 0usize;
    widths
        .iter()
        .map(|&width| {
            let mut value = 0u64;
            for _ in 0..width {
                value = (value << 1) | read_bit_at(data, pos)? as u64;
                pos += 1;
            }
            Some(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_for_bits() {
        assert_eq!(bytes_for_bits(0), 0);
        assert_eq!(bytes_for_bits(1), 1);
        assert_eq!(bytes_for_bits(8), 1);
        assert_eq!(bytes_for_bits(9), 2);
    }

    #[test]
    fn test_mask_for() {
        assert_eq!(mask_for(1), 0x1);
        assert_eq!(mask_for(12), 0xfff);
        assert_eq!(mask_for(64), u64::MAX);
    }

    #[test]
    fn test_pack_first_field_most_significant() {
        // 101 10001 -> 0b1011_0001
        assert_eq!(pack_span(&[(5, 3), (17, 5)]), vec![0b1011_0001]);
    }

    #[test]
    fn test_pack_pads_trailing_bits() {
        // 1 + 0000_0001 + 1 = 10 bits -> 1000_0000 1100_0000
        assert_eq!(pack_span(&[(1, 1), (1, 8), (1, 1)]), vec![0b1000_0000, 0b1100_0000]);
    }

    #[test]
    fn test_pack_masks_oversized_values() {
        assert_eq!(pack_span(&[(0xff, 4), (0, 4)]), vec![0xf0]);
    }

    #[test]
    fn test_unpack_inverse_of_pack() {
        let widths = [3, 5, 8, 1, 7];
        let values = [5, 17, 200, 1, 99];
        let fields: Vec<(u64, u32)> = values.iter().copied().zip(widths.iter().copied()).collect();
        let packed = pack_span(&fields);
        assert_eq!(packed.len(), 3);
        assert_eq!(unpack_span(&packed, &widths), Some(values.to_vec()));
    }

    #[test]
    fn test_unpack_short_input() {
        assert_eq!(unpack_span(&[], &[8]), None);
        assert_eq!(unpack_span(&[0xff], &[4, 5]), None);
        assert_eq!(unpack_span(&[0xff], &[4, 4]), Some(vec![0xf, 0xf]));
        assert_eq!(unpack_span(&[], &[]), Some(vec![]));
    }
}
