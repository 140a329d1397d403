use core::future::Future;
use core::time::Duration;
use embedded_hal::delay::DelayNs;

use crate::commands::FunctionCommand;
use crate::error::Error;
use crate::line::GpioLine;
use crate::rom::RomCode;
use crate::session::{Session, SCRATCHPAD_LEN};

/// The family code shared by all DS18B20 ROM codes.
pub const FAMILY_CODE: u8 = 0x28;

/// The maximum resolution of the sensor when in 12-bit mode, i.e. the value of one raw step.
pub const MAX_RESOLUTION_F32: f32 = 0.0625;

/// Offset added to the raw reading so that -55..+125°C maps onto 0..2880.
pub const TEMPERATURE_BIAS: u16 = 880;

const CONVERSION_TIME_9BIT: Duration = Duration::from_micros(93_750);
const CONVERSION_TIME_10BIT: Duration = Duration::from_micros(187_500);
const CONVERSION_TIME_11BIT: Duration = Duration::from_millis(375);
const CONVERSION_TIME_12BIT: Duration = Duration::from_millis(750);

// Scratchpad layout.
const TEMPERATURE_LSB: usize = 0;
const TEMPERATURE_MSB: usize = 1;
const ALARM_HIGH: usize = 2;
const ALARM_LOW: usize = 3;
const CONFIGURATION: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResolutionMode {
    /// Nine-bit resolution reads the temperature in 0.5 degree increments.
    NineBit = 0b00,
    /// Ten-bit resolution reads the temperature in 0.25 degree increments.
    TenBit = 0b01,
    /// Eleven-bit resolution reads the temperature in 0.125 degree increments.
    ElevenBit = 0b10,
    /// Twelve-bit resolution reads the temperature in 0.0625 degree increments.
    TwelveBit = 0b11,
}

impl ResolutionMode {
    /// The resolution for a bit count in the inclusive range \[9, 12\].
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            9 => Some(ResolutionMode::NineBit),
            10 => Some(ResolutionMode::TenBit),
            11 => Some(ResolutionMode::ElevenBit),
            12 => Some(ResolutionMode::TwelveBit),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8 + 9
    }

    /// The maximum time a conversion takes at this resolution.
    pub fn conversion_time(self) -> Duration {
        match self {
            ResolutionMode::NineBit => CONVERSION_TIME_9BIT,
            ResolutionMode::TenBit => CONVERSION_TIME_10BIT,
            ResolutionMode::ElevenBit => CONVERSION_TIME_11BIT,
            ResolutionMode::TwelveBit => CONVERSION_TIME_12BIT,
        }
    }

    fn configuration_byte(self) -> u8 {
        ((self as u8) << 5) | 0b1_1111
    }

    fn from_configuration_byte(byte: u8) -> Self {
        match (byte >> 5) & 0b11 {
            0b00 => ResolutionMode::NineBit,
            0b01 => ResolutionMode::TenBit,
            0b10 => ResolutionMode::ElevenBit,
            _ => ResolutionMode::TwelveBit,
        }
    }
}

/// The biased raw temperature from a scratchpad: the little-endian reading plus
/// [`TEMPERATURE_BIAS`].
pub fn raw_temperature(scratchpad: &[u8; SCRATCHPAD_LEN]) -> u16 {
    u16::from_le_bytes([scratchpad[TEMPERATURE_LSB], scratchpad[TEMPERATURE_MSB]])
        .wrapping_add(TEMPERATURE_BIAS)
}

/// Converts a biased raw temperature to degrees Celsius.
pub fn raw_to_celsius(raw: u16) -> f32 {
    raw as f32 * MAX_RESOLUTION_F32 - 55.0
}

/// The temperature in tenths of a degree, truncated towards zero.
///
/// Unlike [`raw_temperature`], this reads the register as a signed value without a bias. The
/// two decodings come from different firmware revisions and are kept separate on purpose.
pub fn decicelsius(scratchpad: &[u8; SCRATCHPAD_LEN]) -> i16 {
    let reading = i16::from_le_bytes([scratchpad[TEMPERATURE_LSB], scratchpad[TEMPERATURE_MSB]]);
    (reading as i32 * 10 / 16) as i16
}

/// Client for DS18B20 digital thermometers.
///
/// Decoding methods (`temp_*`) work on the scratchpad held by the session, so they reflect the
/// last successful [`Ds18b20::receive_temp`] (or any other scratchpad read).
pub struct Ds18b20<'a, TPin, TDelay> {
    session: &'a mut Session<TPin, TDelay>,
}

impl<'a, TPin, TDelay> Ds18b20<'a, TPin, TDelay>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    pub fn new(session: &'a mut Session<TPin, TDelay>) -> Self {
        Ds18b20 { session }
    }

    /// Sets the resolution, keeping the alarm thresholds that are stored alongside it.
    ///
    /// The configuration is read back afterwards; [`Error::DataMismatch`] is returned if the
    /// device did not take the new resolution.
    pub fn set_resolution(
        &mut self,
        target: Option<&RomCode>,
        mode: ResolutionMode,
    ) -> Result<(), Error<TPin::Error>> {
        let scratchpad = *self.session.read_scratch(target, None)?;
        let payload = [
            scratchpad[ALARM_HIGH],
            scratchpad[ALARM_LOW],
            mode.configuration_byte(),
        ];
        self.session.write_scratch(target, &payload, None, false)?;
        if self.get_resolution(target)? != mode {
            return Err(Error::DataMismatch);
        }
        Ok(())
    }

    pub fn get_resolution(
        &mut self,
        target: Option<&RomCode>,
    ) -> Result<ResolutionMode, Error<TPin::Error>> {
        let scratchpad = self.session.read_scratch(target, None)?;
        Ok(ResolutionMode::from_configuration_byte(
            scratchpad[CONFIGURATION],
        ))
    }

    /// Starts a temperature conversion. With no target, every sensor on the line converts at
    /// once.
    pub fn convert_t(&mut self, target: Option<&RomCode>) -> Result<(), Error<TPin::Error>> {
        self.session
            .command(target, FunctionCommand::ConvertTemperature, None)
    }

    /// Checks whether the conversion started by [`Ds18b20::convert_t`] has completed.
    ///
    /// Only meaningful for externally powered sensors, and only directly after `convert_t`.
    pub fn poll_conversion(&mut self) -> nb::Result<(), Error<TPin::Error>> {
        self.session.poll_ready()
    }

    /// Reads and validates the scratchpad holding the last conversion.
    pub fn receive_temp(&mut self, target: Option<&RomCode>) -> Result<(), Error<TPin::Error>> {
        self.session.read_scratch(target, None).map(|_| ())
    }

    /// The last temperature, biased into the range \[0, 2880\] for -55..+125°C.
    pub fn temp_raw(&self) -> u16 {
        raw_temperature(self.session.scratchpad())
    }

    /// The last temperature in degrees Celsius.
    pub fn temp_float(&self) -> f32 {
        raw_to_celsius(self.temp_raw())
    }

    /// The last temperature in tenths of a degree Celsius. See [`decicelsius`].
    pub fn temp_decicelsius(&self) -> i16 {
        decicelsius(self.session.scratchpad())
    }

    /// Converts and reads the temperature in degrees Celsius.
    ///
    /// Waits the maximum conversion time for `mode` using the provided `delay_fn`, so the sensor
    /// must be configured for (at most) that resolution.
    pub async fn read_temperature<DelayFn, EmptyFuture>(
        &mut self,
        target: Option<&RomCode>,
        mode: ResolutionMode,
        delay_fn: DelayFn,
    ) -> Result<f32, Error<TPin::Error>>
    where
        DelayFn: Fn(Duration) -> EmptyFuture,
        EmptyFuture: Future<Output = ()>,
    {
        self.convert_t(target)?;
        delay_fn(mode.conversion_time()).await;
        self.receive_temp(target)?;
        Ok(self.temp_float())
    }
}
