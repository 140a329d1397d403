#![cfg_attr(not(test), no_std)]

/// Byte-level transport over a single bus line.
pub mod bus;
/// ROM and function command bytes.
pub mod commands;
/// The 1-Wire CRC8, computed bitwise or from a lookup table.
pub mod crc;
/// Driver for DS18B20 digital thermometers.
///
/// Refer to [this datasheet](https://datasheets.maximintegrated.com/en/ds/DS18B20.pdf) for more
/// information about these devices.
pub mod ds18b20;
/// Driver for DS2438 smart battery monitors.
pub mod ds2438;
mod error;
/// Bit-level timing over a GPIO pin.
pub mod line;
/// 64-bit device ROM codes.
pub mod rom;
/// Incremental enumeration of the devices on a line.
pub mod search;
/// Device addressing and scratchpad access.
pub mod session;
/// Bus timing windows.
pub mod timing;

pub use bus::Bus;
pub use error::Error;
pub use line::{Direction, GpioLine, Line, OpenDrain};
pub use rom::RomCode;
pub use search::SearchState;
pub use session::Session;
pub use timing::Timing;
