//! Enumeration of every device on the line.
//!
//! Each call to [`step`] walks one path of the binary trie formed by all ROM codes on the line,
//! least-significant bit first. The [`SearchState`] returned by a step records the deepest branch
//! point where the 0 path was taken, so the next step re-descends to it and takes the 1 path
//! instead. Devices are therefore found in ascending [`RomCode::search_order`].

use embedded_hal::delay::DelayNs;

use crate::bus::Bus;
use crate::commands::RomCommand;
use crate::crc::crc8;
use crate::error::Error;
use crate::line::GpioLine;
use crate::rom::RomCode;

/// The cursor of an incremental search.
///
/// Bit positions are 1-based, counting from bit 0 of the family byte. A position of 0 means no
/// branch point has been recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SearchState {
    rom: [u8; 8],
    last_discrepancy: u8,
    last_family_discrepancy: u8,
    last_device: bool,
}

impl SearchState {
    /// A cursor positioned at the root, before the first device.
    pub fn new() -> Self {
        SearchState::default()
    }

    /// Position of the deepest branch where the 0 path was taken on the last pass.
    pub fn last_discrepancy(&self) -> u8 {
        self.last_discrepancy
    }

    /// Position of the last 0 branch taken within the family byte.
    pub fn last_family_discrepancy(&self) -> u8 {
        self.last_family_discrepancy
    }

    /// True once the last device on the line has been returned.
    pub fn is_last_device(&self) -> bool {
        self.last_device
    }

    /// The ROM code found by the last successful pass.
    pub fn rom_code(&self) -> RomCode {
        RomCode(self.rom)
    }

    /// Chooses the branch to take at a discrepancy.
    ///
    /// The previous pass's deepest 0 branch flips to 1, deeper positions start at 0, and shallower
    /// positions follow the same path as the previous pass.
    fn discrepancy_branch(&self, position: u8) -> bool {
        if position == self.last_discrepancy {
            true
        } else if position > self.last_discrepancy {
            false
        } else {
            let (index, mask) = bit_location(position);
            self.rom[index] & mask != 0
        }
    }
}

/// Finds the next device on the line.
///
/// Returns the advanced state along with the device found. Any error means the search has to
/// restart from [`SearchState::new`]: [`Error::SearchExhausted`] after the last device,
/// [`Error::NoPresence`] if nothing answered the reset, [`Error::SearchAborted`] if no device
/// followed a branch (usually a device detached mid-search) and [`Error::Crc`] if the assembled
/// ROM code is corrupt.
pub fn step<TPin, TDelay>(
    bus: &mut Bus<TPin, TDelay>,
    state: SearchState,
) -> Result<(SearchState, RomCode), Error<TPin::Error>>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    run(bus, state, RomCommand::Search)
}

/// Like [`step`], except only devices with their alarm flag set take part.
pub fn alarm_step<TPin, TDelay>(
    bus: &mut Bus<TPin, TDelay>,
    state: SearchState,
) -> Result<(SearchState, RomCode), Error<TPin::Error>>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    run(bus, state, RomCommand::AlarmSearch)
}

fn run<TPin, TDelay>(
    bus: &mut Bus<TPin, TDelay>,
    state: SearchState,
    command: RomCommand,
) -> Result<(SearchState, RomCode), Error<TPin::Error>>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    if !bus.reset()? {
        return Err(Error::NoPresence);
    }
    if state.last_device {
        return Err(Error::SearchExhausted);
    }
    bus.send_byte(command as u8)?;

    let mut rom = state.rom;
    let mut last_zero = 0u8;
    let mut last_family_discrepancy = state.last_family_discrepancy;
    for position in 1..=64u8 {
        // Every device still taking part sends its bit, then the complement.
        let id_bit = bus.read_bit()?;
        let complement_bit = bus.read_bit()?;
        let direction = match (id_bit, complement_bit) {
            (true, true) => {
                log::debug!("search aborted at bit {}", position);
                return Err(Error::SearchAborted);
            }
            (false, false) => {
                let direction = state.discrepancy_branch(position);
                if !direction {
                    last_zero = position;
                    if last_zero < 9 {
                        last_family_discrepancy = last_zero;
                    }
                }
                direction
            }
            (bit, _) => bit,
        };

        let (index, mask) = bit_location(position);
        if direction {
            rom[index] |= mask;
        } else {
            rom[index] &= !mask;
        }
        // Devices whose bit differs drop out until the next reset.
        bus.write_bit(direction)?;
    }

    if crc8(&rom) != 0 {
        log::warn!("search found ROM code with bad CRC: {}", RomCode(rom));
        return Err(Error::Crc);
    }

    let next = SearchState {
        rom,
        last_discrepancy: last_zero,
        last_family_discrepancy,
        last_device: last_zero == 0,
    };
    log::debug!(
        "search found {}, last discrepancy {}",
        RomCode(rom),
        last_zero
    );
    Ok((next, RomCode(rom)))
}

fn bit_location(position: u8) -> (usize, u8) {
    let offset = position - 1;
    ((offset / 8) as usize, 1 << (offset % 8))
}
