//! Dallas/Maxim CRC-8 (x^8 + x^5 + x^4 + 1) used by 1-Wire ROMs.

/// Reflected representation of the CRC-8 polynomial.
const POLY_REFLECTED: u8 = 0x8c;

/// Bit-serial CRC-8 update of `crc` with `data`.
const fn crc8_bitwise(mut data: u8, mut crc: u8) -> u8 {
    let mut i = 0;
    while i < 8 {
        let mix = (crc ^ data) & 0x01;
        crc >>= 1;
        if mix != 0 {
            crc ^= POLY_REFLECTED;
        }
        data >>= 1;
        i += 1;
    }
    crc
}

#[cfg(feature = "crc-table")]
const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = crc8_bitwise(i as u8, 0);
        i += 1;
    }
    table
};

/// Fold one byte into a running 1-Wire CRC-8.
///
/// With the `crc-table` feature (default) this is a single lookup in a
/// 256-entry table generated at compile time. Without it the polynomial is
/// applied bit by bit; both produce identical results.
#[cfg(feature = "crc-table")]
#[inline]
pub const fn crc8(data: u8, crc: u8) -> u8 {
    CRC8_TABLE[(crc ^ data) as usize]
}

/// Fold one byte into a running 1-Wire CRC-8, bit by bit.
#[cfg(not(feature = "crc-table"))]
#[inline]
pub const fn crc8(data: u8, crc: u8) -> u8 {
    crc8_bitwise(data, crc)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Calculate CRC-8 used in 1-Wire communications.
pub struct OneWireCrc(u8);

impl OneWireCrc {
    /// Start a new CRC from an initial running value.
    pub const fn new(init: u8) -> Self {
        Self(init)
    }

    /// Get the current CRC value
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Update the CRC with the incoming byte.
    pub fn update(&mut self, byte: u8) {
        self.0 = crc8(byte, self.0);
    }

    /// CRC of a sequence of bytes, starting from zero.
    pub const fn checksum(bytes: &[u8]) -> u8 {
        let mut crc = 0;
        let mut i = 0;
        while i < bytes.len() {
            crc = crc8(bytes[i], crc);
            i += 1;
        }
        crc
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        let mut crc = OneWireCrc(0);
        for &byte in sequence.iter() {
            crc.update(byte);
        }
        crc.0 == 0x0 // If the last byte of the ROM is the CRC, the result should be 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_values() {
        assert_eq!(crc8(0x01, 0), 94);
        assert_eq!(crc8(0x02, 0), 188);
        assert_eq!(crc8(0x80, 0), 140);
        assert_eq!(crc8(0xff, 0), 53);
    }

    #[test]
    fn lookup_matches_bit_serial() {
        for crc in [0x00u8, 0x5e, 0xa7, 0xff] {
            for data in 0..=255u8 {
                assert_eq!(crc8(data, crc), crc8_bitwise(data, crc));
            }
        }
    }

    #[test]
    fn known_rom_checksums() {
        assert_eq!(OneWireCrc::checksum(&[0x28, 0xff, 0x64, 0x1e, 0x0f, 0x00, 0x00]), 0x34);
        assert_eq!(OneWireCrc::checksum(&[0x28, 1, 2, 3, 4, 5, 6]), 0x9e);
        assert_eq!(OneWireCrc::checksum(&[0x01, 0, 0, 0, 0, 0, 0]), 0x3d);
    }

    #[test]
    fn validate_accepts_trailing_crc() {
        assert!(OneWireCrc::validate(&[0x42, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0xf7]));
        assert!(!OneWireCrc::validate(&[0x42, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0xf6]));
    }

    #[test]
    fn running_update() {
        let mut crc = OneWireCrc::default();
        for byte in [0x28, 1, 2, 3, 4, 5, 6] {
            crc.update(byte);
        }
        assert_eq!(crc.value(), 0x9e);
        crc.update(0x9e);
        assert_eq!(crc.value(), 0);
    }
}
