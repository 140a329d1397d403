use core::fmt;

use crate::crc::crc8;

/// The 64-bit ROM code of a device.
///
/// Used to speak with that device directly when there are multiple devices on the line. Byte 0 is
/// the family code, bytes 1-6 the serial number and byte 7 the CRC of the first seven bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RomCode(pub [u8; 8]);

impl RomCode {
    /// Builds a ROM code with a valid CRC from a family code and a 48-bit serial.
    pub fn new(family_code: u8, serial: u64) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = family_code;
        bytes[1..7].copy_from_slice(&serial.to_le_bytes()[..6]);
        bytes[7] = crc8(&bytes[..7]);
        RomCode(bytes)
    }

    pub fn family_code(&self) -> u8 {
        self.0[0]
    }

    pub fn serial(&self) -> u64 {
        let mut copy = [0u8; 8];
        copy[..6].copy_from_slice(&self.0[1..7]);
        u64::from_le_bytes(copy)
    }

    pub fn crc(&self) -> u8 {
        self.0[7]
    }

    /// True when the CRC over all eight bytes is zero.
    pub fn is_valid(&self) -> bool {
        crc8(&self.0) == 0
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Ordering key matching the order in which search finds devices.
    ///
    /// Search walks the code least-significant bit first, taking the 0 branch first.
    pub fn search_order(&self) -> u64 {
        u64::from_le_bytes(self.0).reverse_bits()
    }
}

impl From<[u8; 8]> for RomCode {
    fn from(bytes: [u8; 8]) -> Self {
        RomCode(bytes)
    }
}

impl fmt::Display for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
