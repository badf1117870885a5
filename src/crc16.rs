//! CRC-16 used to integrity-check the configuration record, error-log
//! wraparound is *not* CRC protected (it uses the monotonic id instead, see
//! [`crate::error_log`]), but the config store and the per-sensor extrema
//! persisted on the hub both are.
//!
//! Polynomial 0x8005, MSB-first, init 0x0000, no input/output reflection,
//! no final XOR — this is CRC-16/BUYPASS, reused from the `crc` crate
//! rather than hand-rolled, matching the teacher's use of the same crate
//! for its own CRC-16 check.

use crc::{Crc, CRC_16_BUYPASS};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_BUYPASS);

/// Compute the CRC-16 over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_zero_byte_is_zero() {
        assert_eq!(crc16(&[0x00]), 0x0000);
    }

    #[test]
    fn spec_test_vector() {
        let data = [
            0xFE, 0x29, 0x15, 0x7C, 0xA7, 0xAE, 0x7C, 0x42, 0x21, 0xA5, 0xA6, 0xDA, 0x6B, 0x32,
            0x12, 0x94,
        ];
        assert_eq!(crc16(&data), 0x17FB);
    }

    #[test]
    fn single_bit_flip_changes_crc() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let base = crc16(&data);
        let mut flipped = data;
        flipped[1] ^= 0x01;
        assert_ne!(crc16(&flipped), base);
    }
}
