use embedded_hal::delay::DelayNs;

use crate::commands::FunctionCommand;
use crate::error::Error;
use crate::line::GpioLine;
use crate::rom::RomCode;
use crate::session::{Session, SCRATCHPAD_LEN};

/// The family code shared by all DS2438 ROM codes.
pub const FAMILY_CODE: u8 = 0x26;

/// Page 0 holds the status/configuration register, temperature, voltage and current.
pub const PAGE_STATUS: u8 = 0x00;

/// Configuration bit: enables the current A/D converter.
pub const CONFIG_IAD: u8 = 0x01;
/// Configuration bit: enables the current accumulator.
pub const CONFIG_CA: u8 = 0x02;
/// Configuration bit: stores the current accumulator to EEPROM.
pub const CONFIG_EE: u8 = 0x04;
/// Configuration bit: selects V<sub>DD</sub> (1) or V<sub>AD</sub> (0) for voltage conversions.
pub const CONFIG_AD: u8 = 0x08;

const VOLTAGE_LSB: usize = 3;
const VOLTAGE_MSB: usize = 4;

/// The voltage register from a page 0 scratchpad, in units of 10mV.
pub fn raw_voltage(scratchpad: &[u8; SCRATCHPAD_LEN]) -> u16 {
    u16::from_le_bytes([scratchpad[VOLTAGE_LSB], scratchpad[VOLTAGE_MSB]])
}

pub fn raw_to_volts(raw: u16) -> f32 {
    raw as f32 / 100.0
}

/// Client for DS2438 smart battery monitors.
pub struct Ds2438<'a, TPin, TDelay> {
    session: &'a mut Session<TPin, TDelay>,
}

impl<'a, TPin, TDelay> Ds2438<'a, TPin, TDelay>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    pub fn new(session: &'a mut Session<TPin, TDelay>) -> Self {
        Ds2438 { session }
    }

    /// Writes the configuration byte to the scratchpad of the given page.
    ///
    /// The byte only takes effect on the device's memory after [`Ds2438::store_configuration`]
    /// or a separate copy.
    pub fn set_configuration(
        &mut self,
        target: Option<&RomCode>,
        config: u8,
        page: Option<u8>,
        verify: bool,
    ) -> Result<(), Error<TPin::Error>> {
        self.session.write_scratch(target, &[config], page, verify)
    }

    /// Writes the configuration and copies the scratchpad into the page.
    pub fn store_configuration(
        &mut self,
        target: Option<&RomCode>,
        config: u8,
        page: u8,
        verify: bool,
    ) -> Result<(), Error<TPin::Error>> {
        self.set_configuration(target, config, Some(page), verify)?;
        self.session.copy_scratch(target, Some(page))
    }

    /// Starts a voltage conversion on the input selected by [`CONFIG_AD`].
    pub fn convert_v(&mut self, target: Option<&RomCode>) -> Result<(), Error<TPin::Error>> {
        self.session
            .command(target, FunctionCommand::ConvertVoltage, None)
    }

    /// Checks whether the conversion started by [`Ds2438::convert_v`] has completed.
    pub fn poll_conversion(&mut self) -> nb::Result<(), Error<TPin::Error>> {
        self.session.poll_ready()
    }

    /// Copies the stored page into the scratchpad.
    pub fn recall_memory(
        &mut self,
        target: Option<&RomCode>,
        page: u8,
    ) -> Result<(), Error<TPin::Error>> {
        self.session
            .command(target, FunctionCommand::RecallMemory, Some(page))
    }

    /// Reads and validates the scratchpad of the given page.
    pub fn receive_volt(
        &mut self,
        target: Option<&RomCode>,
        page: u8,
    ) -> Result<(), Error<TPin::Error>> {
        self.session.read_scratch(target, Some(page)).map(|_| ())
    }

    /// The last voltage reading in units of 10mV.
    pub fn volt_raw(&self) -> u16 {
        raw_voltage(self.session.scratchpad())
    }

    /// The last voltage reading in volts.
    pub fn volt_float(&self) -> f32 {
        raw_to_volts(self.volt_raw())
    }
}
