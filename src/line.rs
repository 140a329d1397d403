use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

use crate::timing::Timing;

/// Direction of a GPIO line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// The pin is not driven and follows the bus pull-up.
    Input,
    /// The pin drives the configured output level.
    Output,
}

/// The register-like view of a single GPIO pin that the bus is driven through.
///
/// Mirrors the three registers of a simple microcontroller port: direction, output level and input
/// level. The line only ever drives low, so the output level is set once to
/// [`PinState::Low`] and switching the direction to [`Direction::Output`] pulls the bus down.
pub trait GpioLine: ErrorType {
    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error>;
    fn set_level(&mut self, level: PinState) -> Result<(), Self::Error>;
    fn is_high(&mut self) -> Result<bool, Self::Error>;
}

/// Adapts an open-drain HAL pin to a [`GpioLine`].
///
/// The pin must already be configured as open-drain with an external pull-up, so that driving it
/// high releases the bus.
#[derive(Debug)]
pub struct OpenDrain<TPin> {
    pin: TPin,
    direction: Direction,
    level: PinState,
}

impl<TPin> OpenDrain<TPin> {
    pub fn new(pin: TPin) -> Self {
        OpenDrain {
            pin,
            direction: Direction::Input,
            level: PinState::High,
        }
    }

    pub fn into_inner(self) -> TPin {
        self.pin
    }
}

impl<TPin, TError> OpenDrain<TPin>
where
    TPin: InputPin<Error = TError> + OutputPin<Error = TError>,
{
    fn apply(&mut self) -> Result<(), TError> {
        match (self.direction, self.level) {
            (Direction::Output, PinState::Low) => self.pin.set_low(),
            _ => self.pin.set_high(),
        }
    }
}

impl<TPin: ErrorType> ErrorType for OpenDrain<TPin> {
    type Error = TPin::Error;
}

impl<TPin, TError> GpioLine for OpenDrain<TPin>
where
    TPin: InputPin<Error = TError> + OutputPin<Error = TError>,
    TError: embedded_hal::digital::Error,
{
    fn set_direction(&mut self, direction: Direction) -> Result<(), TError> {
        self.direction = direction;
        self.apply()
    }

    fn set_level(&mut self, level: PinState) -> Result<(), TError> {
        self.level = level;
        self.apply()
    }

    fn is_high(&mut self) -> Result<bool, TError> {
        self.pin.is_high()
    }
}

/// Bit-level driver for a single bus line.
///
/// All operations busy-wait through the provided delay, using the build's [`Timing::DEFAULT`]
/// windows. Nothing here can detect a timing error: a delay implementation that is too slow or
/// too fast silently corrupts the transfer.
#[derive(Debug)]
pub struct Line<TPin, TDelay> {
    pin: TPin,
    delay: TDelay,
}

impl<TPin, TDelay> Line<TPin, TDelay>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    /// Takes ownership of the pin and leaves the bus released.
    pub fn new(mut pin: TPin, delay: TDelay) -> Result<Self, TPin::Error> {
        pin.set_direction(Direction::Input)?;
        pin.set_level(PinState::Low)?;
        Ok(Line { pin, delay })
    }

    pub fn release(self) -> (TPin, TDelay) {
        (self.pin, self.delay)
    }

    /// Sends a reset pulse and returns whether any device answered with a presence pulse.
    pub fn reset(&mut self) -> Result<bool, TPin::Error> {
        let timing = Timing::DEFAULT;
        self.delay.delay_ns(timing.g);
        self.drive_low()?;
        self.delay.delay_ns(timing.h);
        self.float()?;
        self.delay.delay_ns(timing.i);
        let is_present = !self.pin.is_high()?;
        self.delay.delay_ns(timing.j);
        Ok(is_present)
    }

    /// Writes a single bit to the line.
    pub fn write_bit(&mut self, bit: bool) -> Result<(), TPin::Error> {
        let timing = Timing::DEFAULT;
        self.drive_low()?;
        self.delay.delay_ns(timing.a);
        if !bit {
            self.delay.delay_ns(timing.c);
        }
        self.float()?;
        self.delay.delay_ns(timing.d);
        if bit {
            self.delay.delay_ns(timing.b);
        }
        Ok(())
    }

    /// Reads a single bit from the line.
    pub fn read_bit(&mut self) -> Result<bool, TPin::Error> {
        let timing = Timing::DEFAULT;
        self.drive_low()?;
        self.delay.delay_ns(timing.a);
        self.float()?;
        self.delay.delay_ns(timing.e);
        let bit = self.pin.is_high()?;
        self.delay.delay_ns(timing.f);
        Ok(bit)
    }

    fn drive_low(&mut self) -> Result<(), TPin::Error> {
        self.pin.set_direction(Direction::Output)
    }

    fn float(&mut self) -> Result<(), TPin::Error> {
        self.pin.set_direction(Direction::Input)
    }
}
