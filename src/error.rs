#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<TIoError> {
    /// Wrapped error from the HAL.
    Wrapped(TIoError),
    /// No device answered the reset pulse with a presence pulse.
    NoPresence,
    /// Both search bits read high, so no device followed the current branch.
    SearchAborted,
    /// The previous search step already returned the last device on the line.
    SearchExhausted,
    /// A ROM code or scratchpad failed its CRC check.
    Crc,
    /// Data read back after a verified write differs from what was written.
    DataMismatch,
    /// Invalid argument was provided.
    InvalidArgument,
}

impl<TIoError> From<TIoError> for Error<TIoError> {
    fn from(error: TIoError) -> Error<TIoError> {
        Error::Wrapped(error)
    }
}
