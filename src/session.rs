use embedded_hal::delay::DelayNs;

use crate::bus::Bus;
use crate::commands::{FunctionCommand, RomCommand};
use crate::crc::crc8;
use crate::error::Error;
use crate::line::GpioLine;
use crate::rom::RomCode;
use crate::search::{self, SearchState};

/// Size of a scratchpad read, including the trailing CRC byte.
pub const SCRATCHPAD_LEN: usize = 9;

/// Device-level access to a [`Bus`]: addressing, search and scratchpad transfers.
///
/// Every command that takes a `target` addresses a single device when given its ROM code, or all
/// devices at once (Skip ROM) when given `None`. Broadcasting is always allowed for commands that
/// only trigger an action, but commands that read data back require either a ROM code or a bus in
/// single-device mode, otherwise they fail with [`Error::InvalidArgument`].
#[derive(Debug)]
pub struct Session<TPin, TDelay> {
    bus: Bus<TPin, TDelay>,
    search: SearchState,
    scratchpad: [u8; SCRATCHPAD_LEN],
}

impl<TPin, TDelay> Session<TPin, TDelay>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    pub fn new(bus: Bus<TPin, TDelay>) -> Self {
        Session {
            bus,
            search: SearchState::new(),
            scratchpad: [0u8; SCRATCHPAD_LEN],
        }
    }

    pub fn bus(&mut self) -> &mut Bus<TPin, TDelay> {
        &mut self.bus
    }

    pub fn into_bus(self) -> Bus<TPin, TDelay> {
        self.bus
    }

    /// The scratchpad contents from the last successful read.
    pub fn scratchpad(&self) -> &[u8; SCRATCHPAD_LEN] {
        &self.scratchpad
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    /// Finds the next device on the line.
    ///
    /// Repeated calls return every device once, in [`RomCode::search_order`]. Once the last
    /// device has been returned, this keeps returning `Ok(None)` until [`Session::reset_search`].
    /// Any error clears the search so that the next call starts over.
    pub fn search(&mut self) -> Result<Option<RomCode>, Error<TPin::Error>> {
        let result = search::step(&mut self.bus, self.search);
        self.advance_search(result)
    }

    /// Like [`Session::search`], but only devices with an active alarm respond.
    pub fn alarm_search(&mut self) -> Result<Option<RomCode>, Error<TPin::Error>> {
        let result = search::alarm_step(&mut self.bus, self.search);
        self.advance_search(result)
    }

    fn advance_search(
        &mut self,
        result: Result<(SearchState, RomCode), Error<TPin::Error>>,
    ) -> Result<Option<RomCode>, Error<TPin::Error>> {
        match result {
            Ok((state, rom)) => {
                self.search = state;
                Ok(Some(rom))
            }
            Err(Error::SearchExhausted) => Ok(None),
            Err(err) => {
                self.search = SearchState::new();
                Err(err)
            }
        }
    }

    /// Restarts the search from the first device.
    pub fn reset_search(&mut self) {
        self.search = SearchState::new();
    }

    /// Iterates over every device on the line, starting from the first.
    pub fn devices(&mut self) -> Devices<'_, TPin, TDelay> {
        self.reset_search();
        Devices {
            session: self,
            done: false,
        }
    }

    /// Reads the ROM code of the only device on the line.
    ///
    /// With several devices attached their codes collide, which shows up as [`Error::Crc`].
    pub fn read_rom(&mut self) -> Result<RomCode, Error<TPin::Error>> {
        if !self.bus.reset()? {
            return Err(Error::NoPresence);
        }
        self.bus.send_byte(RomCommand::Read as u8)?;
        let mut bytes = [0u8; 8];
        self.bus.receive_bytes(&mut bytes)?;
        let rom = RomCode(bytes);
        if !rom.is_valid() {
            log::warn!("read ROM returned bad CRC: {}", rom);
            return Err(Error::Crc);
        }
        Ok(rom)
    }

    /// Sends a Match ROM command, selecting a single device for the next function command.
    ///
    /// Must directly follow a reset.
    pub fn match_rom(&mut self, address: &RomCode) -> Result<(), Error<TPin::Error>> {
        self.bus.send_byte(RomCommand::Match as u8)?;
        self.bus.send_bytes(address.as_bytes())?;
        Ok(())
    }

    /// Resets the bus and addresses the target.
    ///
    /// `reads_data` marks commands that expect a response, which may not be broadcast to a bus
    /// that could hold several devices.
    pub fn select(
        &mut self,
        target: Option<&RomCode>,
        reads_data: bool,
    ) -> Result<(), Error<TPin::Error>> {
        if target.is_none() && reads_data && !self.bus.is_single_device() {
            return Err(Error::InvalidArgument);
        }
        if !self.bus.reset()? {
            return Err(Error::NoPresence);
        }
        match target {
            Some(address) => self.match_rom(address),
            None => Ok(self.bus.send_byte(RomCommand::Skip as u8)?),
        }
    }

    /// Addresses the target and sends a function command with an optional parameter byte.
    pub fn command(
        &mut self,
        target: Option<&RomCode>,
        command: FunctionCommand,
        parameter: Option<u8>,
    ) -> Result<(), Error<TPin::Error>> {
        self.select(target, false)?;
        self.bus.send_byte(command as u8)?;
        if let Some(parameter) = parameter {
            self.bus.send_byte(parameter)?;
        }
        Ok(())
    }

    /// Writes the payload to the target's scratchpad, after the page number if one is given.
    ///
    /// With `verify`, the scratchpad (of the same page) is read back and its first byte compared
    /// to the first payload byte.
    pub fn write_scratch(
        &mut self,
        target: Option<&RomCode>,
        payload: &[u8],
        page: Option<u8>,
        verify: bool,
    ) -> Result<(), Error<TPin::Error>> {
        if payload.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.select(target, verify)?;
        self.bus.send_byte(FunctionCommand::WriteScratchpad as u8)?;
        if let Some(page) = page {
            self.bus.send_byte(page)?;
        }
        self.bus.send_bytes(payload)?;

        if verify {
            let written = payload[0];
            let read_back = self.read_scratch(target, page)?[0];
            if read_back != written {
                log::debug!(
                    "scratchpad verify mismatch: wrote {:#04x}, read {:#04x}",
                    written,
                    read_back
                );
                return Err(Error::DataMismatch);
            }
        }
        Ok(())
    }

    /// Reads and validates the target's scratchpad (of the given page).
    ///
    /// The stored scratchpad is only replaced when the read passes its CRC check.
    pub fn read_scratch(
        &mut self,
        target: Option<&RomCode>,
        page: Option<u8>,
    ) -> Result<&[u8; SCRATCHPAD_LEN], Error<TPin::Error>> {
        self.select(target, true)?;
        self.bus.send_byte(FunctionCommand::ReadScratchpad as u8)?;
        if let Some(page) = page {
            self.bus.send_byte(page)?;
        }
        let mut data = [0u8; SCRATCHPAD_LEN];
        self.bus.receive_bytes(&mut data)?;
        if crc8(&data) != 0 {
            log::warn!("scratchpad read failed CRC check: {:02x?}", data);
            return Err(Error::Crc);
        }
        self.scratchpad = data;
        Ok(&self.scratchpad)
    }

    /// Copies the scratchpad to the target's memory (to the given page).
    pub fn copy_scratch(
        &mut self,
        target: Option<&RomCode>,
        page: Option<u8>,
    ) -> Result<(), Error<TPin::Error>> {
        self.command(target, FunctionCommand::CopyScratchpad, page)
    }

    /// Issues a read slot to check whether the selected devices finished their last operation.
    ///
    /// Devices hold the line low while converting or copying.
    pub fn poll_ready(&mut self) -> nb::Result<(), Error<TPin::Error>> {
        if self.bus.read_bit().map_err(Error::Wrapped)? {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

/// Iterator over all devices on the line. See [`Session::devices`].
pub struct Devices<'a, TPin, TDelay> {
    session: &'a mut Session<TPin, TDelay>,
    done: bool,
}

impl<'a, TPin, TDelay> Iterator for Devices<'a, TPin, TDelay>
where
    TPin: GpioLine,
    TDelay: DelayNs,
{
    type Item = Result<RomCode, Error<TPin::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.session.search() {
            Ok(Some(rom)) => Some(Ok(rom)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
