// Necessary access sequence:
// 1. Initialization (reset and presence pulse).
// 2. ROM command (followed by required data, if any).
// 3. Function command (followed by data, if any).
//    This step is skipped if step 2 was either a Search ROM or an Alarm Search function.

/// Administrative commands for operating the 1-bit data line.
///
/// These are used to retrieve information about devices on the line, or to request those devices
/// to perform more specific operations (see [`FunctionCommand`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RomCommand {
    /// Searches for all devices on the line.
    ///
    /// Cannot be followed by a function command.
    Search = 0xF0,
    /// Reads the peripheral device's 64-bit ROM code.
    ///
    /// Only possible when there is a single device on the line.
    Read = 0x33,
    /// Selects a specific peripheral device by its 64-bit ROM code.
    ///
    /// Only the selected device will respond to the subsequent function command.
    Match = 0x55,
    /// Addresses all devices simultaneously.
    ///
    /// If there is only one device on the line, this can be used instead of `Match` for all
    /// function commands. However, if there are multiple devices on the line, then this only works
    /// for commands that don't return data, such as `ConvertTemperature`.
    Skip = 0xCC,
    /// Identical to `Search`, except only devices whose alarm flag is set will respond.
    ///
    /// Cannot be followed by a function command.
    AlarmSearch = 0xEC,
}

/// Requests the selected device(s) perform some operation.
///
/// These commands can only be sent after a `Read`, `Match`, or `Skip` [`RomCommand`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionCommand {
    /// Stores the current temperature in the 2-byte temperature register of the scratchpad.
    ///
    /// The device answers read slots with 0 while the conversion runs and with 1 once complete.
    ConvertTemperature = 0x44,
    /// Starts an A/D conversion of the battery or supply voltage (DS2438).
    ConvertVoltage = 0xB4,
    /// Writes data to the scratchpad.
    ///
    /// Page-organised devices expect the page number as the first data byte.
    WriteScratchpad = 0x4E,
    /// Reads the contents of the scratchpad.
    ///
    /// Page-organised devices expect the page number before the device starts sending. A reset
    /// may be issued mid-read to cancel the rest of the read.
    ReadScratchpad = 0xBE,
    /// Copies the scratchpad to EEPROM or SRAM. Followed by the target page on paged devices.
    CopyScratchpad = 0x48,
    /// Copies stored memory back into the scratchpad. Followed by the source page on paged
    /// devices.
    RecallMemory = 0xB8,
}
