/// Maxim 1-Wire CRC8 lookup table (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub const CRC8_TABLE: [u8; 256] = build_table();

const POLYNOMIAL_REFLECTED: u8 = 0x8C;

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = crc8_byte(0, i as u8);
        i += 1;
    }
    table
}

const fn crc8_byte(crc: u8, byte: u8) -> u8 {
    let mut crc = crc;
    let mut byte = byte;
    let mut bit = 0;
    while bit < 8 {
        let mix = (crc ^ byte) & 0x01;
        crc >>= 1;
        if mix != 0 {
            crc ^= POLYNOMIAL_REFLECTED;
        }
        byte >>= 1;
        bit += 1;
    }
    crc
}

/// Computes the CRC8 one bit at a time.
///
/// Feeding a block followed by its own CRC byte yields 0.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, byte| crc8_byte(crc, *byte))
}

/// Computes the same CRC8 as [`crc8`] using [`CRC8_TABLE`].
pub fn crc8_table(data: &[u8]) -> u8 {
    data.iter()
        .fold(0, |crc, byte| CRC8_TABLE[(crc ^ byte) as usize])
}
