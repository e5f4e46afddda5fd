use crate::{OneWireCrc, OneWireSlaveError, OneWireSlaveResult};

/// 64-bit 1-Wire ROM identifier as stored by the device.
///
/// | Byte | Description |
/// |------|-------------|
/// | 0 | Family code (e.g., 0x28 for DS18B20) |
/// | 1-6 | Serial number, least significant byte first |
/// | 7 | CRC-8 (`0b1_0001_1001` poly) of bytes 0-6 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId([u8; 8]);

impl DeviceId {
    /// Build an identifier from a family code and serial number, computing the
    /// trailing CRC.
    ///
    /// This is a `const fn`, so identifiers can be provisioned at compile time:
    ///
    /// ```
    /// use embedded_onewire_slave::DeviceId;
    /// const ID: DeviceId = DeviceId::new(0x28, [1, 2, 3, 4, 5, 6]);
    /// assert_eq!(ID.crc(), 0x9e);
    /// ```
    pub const fn new(family: u8, serial: [u8; 6]) -> Self {
        let mut rom = [family, serial[0], serial[1], serial[2], serial[3], serial[4], serial[5], 0];
        let mut crc = 0;
        let mut i = 0;
        while i < 7 {
            crc = crate::crc8(rom[i], crc);
            i += 1;
        }
        rom[7] = crc;
        Self(rom)
    }

    /// Wrap provisioned ROM bytes after checking their CRC.
    pub fn from_bytes(bytes: [u8; 8]) -> OneWireSlaveResult<Self> {
        if OneWireCrc::validate(&bytes) {
            Ok(Self(bytes))
        } else {
            Err(OneWireSlaveError::InvalidRomCrc)
        }
    }

    /// Wrap ROM bytes without checking the CRC.
    ///
    /// The engine transmits these bytes verbatim, whatever the CRC says.
    pub const fn from_raw(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Family code.
    pub const fn family(&self) -> u8 {
        self.0[0]
    }

    /// Six serial number bytes.
    pub const fn serial(&self) -> [u8; 6] {
        [self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6]]
    }

    /// Stored CRC byte.
    pub const fn crc(&self) -> u8 {
        self.0[7]
    }

    /// All eight ROM bytes in transmission order.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Whether the stored CRC matches the family and serial bytes.
    pub const fn is_valid(&self) -> bool {
        OneWireCrc::checksum(&self.0) == 0
    }

    /// ROM as a `u64`, family code in the least significant byte.
    pub const fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }
}

impl From<DeviceId> for u64 {
    fn from(value: DeviceId) -> Self {
        value.to_u64()
    }
}

impl From<DeviceId> for [u8; 8] {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}
