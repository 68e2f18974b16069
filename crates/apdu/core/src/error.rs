//! Error types for APDU transcoding

/// Result type for transcoding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while splitting or translating a command buffer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The command buffer is shorter than its mandatory header
    #[error("Malformed command: expected at least {expected} bytes, got {actual}")]
    MalformedCommand {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes supplied
        actual: usize,
    },

    /// The legacy instruction byte has no translation
    #[error("Unsupported SIM I/O instruction: {0:#04X}")]
    UnsupportedInstruction(u8),

    /// The channel number cannot be expressed in a class byte
    #[error("Channel number {0} out of range (0..=19)")]
    InvalidChannelNumber(u8),
}
