use embedded_hal::delay::DelayNs;

use crate::line::{GpioLine, Line};

/// Byte-level transport over a single [`Line`].
#[derive(Debug)]
pub struct Bus<TPin, TDelay> {
    line: Line<TPin, TDelay>,
    single_device: bool,
}

impl<TPin, TDelay> Bus<TPin, TDelay>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    pub fn new(line: Line<TPin, TDelay>) -> Self {
        Bus {
            line,
            single_device: false,
        }
    }

    /// Constructs the line from a pin and delay and wraps it in a bus.
    pub fn from_pin(pin: TPin, delay: TDelay) -> Result<Self, TPin::Error> {
        Ok(Bus::new(Line::new(pin, delay)?))
    }

    pub fn into_line(self) -> Line<TPin, TDelay> {
        self.line
    }

    /// Asserts that exactly one device is attached.
    ///
    /// When set, reads may address the device with a Skip ROM command instead of its ROM code.
    pub fn set_single_device(&mut self, single_device: bool) {
        self.single_device = single_device;
    }

    pub fn is_single_device(&self) -> bool {
        self.single_device
    }

    /// Resets the line and returns whether any device is present.
    pub fn reset(&mut self) -> Result<bool, TPin::Error> {
        let is_present = self.line.reset()?;
        log::trace!("1-wire reset, presence: {}", is_present);
        Ok(is_present)
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), TPin::Error> {
        self.line.write_bit(bit)
    }

    pub fn read_bit(&mut self) -> Result<bool, TPin::Error> {
        self.line.read_bit()
    }

    /// Sends a byte, least-significant bit first.
    pub fn send_byte(&mut self, byte: u8) -> Result<(), TPin::Error> {
        let mut byte = byte;
        for _ in 0..8 {
            self.line.write_bit(byte & 0x01 != 0)?;
            byte >>= 1;
        }
        Ok(())
    }

    /// Receives a byte, least-significant bit first.
    pub fn receive_byte(&mut self) -> Result<u8, TPin::Error> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.line.read_bit()? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TPin::Error> {
        for byte in bytes.iter() {
            self.send_byte(*byte)?;
        }
        Ok(())
    }

    pub fn receive_bytes(&mut self, bytes: &mut [u8]) -> Result<(), TPin::Error> {
        for byte in bytes.iter_mut() {
            *byte = self.receive_byte()?;
        }
        Ok(())
    }
}
