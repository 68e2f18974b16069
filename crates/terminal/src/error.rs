//! Error types for terminal operations

use crate::provider::ProviderError;

/// Result type for terminal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for terminal operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transcoding errors (malformed buffers, unsupported legacy instructions)
    #[error(transparent)]
    Apdu(#[from] uicc_apdu_core::Error),

    /// The referenced channel index is not allocated or already closed
    #[error("Channel {0} is not open")]
    ChannelNotOpen(usize),

    /// The provider could not find the requested applet
    #[error("Applet not found")]
    AppletNotFound,

    /// The provider failed to open a logical channel
    #[error("Opening logical channel failed: {0}")]
    ChannelOpenFailed(String),

    /// The provider failed to close a logical channel
    #[error("Closing logical channel {0} failed")]
    CloseFailed(usize),

    /// The provider failed to carry out a transmission
    #[error("Transmit failed: {0}")]
    Transmit(#[from] ProviderError),
}

/// Coarse classification of an [`Error`], stable across releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Command buffer too short
    MalformedCommand,
    /// Legacy instruction byte without translation
    UnsupportedInstruction,
    /// Channel index not allocated, closed, or not addressable
    ChannelNotOpen,
    /// No such applet on the card
    AppletNotFound,
    /// Logical channel could not be opened
    ChannelOpenFailed,
    /// Logical channel could not be closed
    CloseFailed,
    /// Provider-level I/O failure while transmitting
    TransmitFailed,
}

impl Error {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Apdu(uicc_apdu_core::Error::UnsupportedInstruction(_)) => {
                ErrorKind::UnsupportedInstruction
            }
            Self::Apdu(uicc_apdu_core::Error::MalformedCommand { .. }) => {
                ErrorKind::MalformedCommand
            }
            Self::Apdu(uicc_apdu_core::Error::InvalidChannelNumber(_)) => ErrorKind::ChannelNotOpen,
            Self::ChannelNotOpen(_) => ErrorKind::ChannelNotOpen,
            Self::AppletNotFound => ErrorKind::AppletNotFound,
            Self::ChannelOpenFailed(_) => ErrorKind::ChannelOpenFailed,
            Self::CloseFailed(_) => ErrorKind::CloseFailed,
            Self::Transmit(_) => ErrorKind::TransmitFailed,
        }
    }
}

/// Plain-data form of an [`Error`] for hosts that marshal results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCarrier {
    /// What went wrong
    pub kind: ErrorKind,
    /// Human readable description
    pub message: String,
}

impl From<&Error> for ErrorCarrier {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<Error> for ErrorCarrier {
    fn from(error: Error) -> Self {
        Self::from(&error)
    }
}

/// Flatten an operation result for hosts that marshal errors as data
pub fn carry<T>(result: Result<T>) -> std::result::Result<T, ErrorCarrier> {
    result.map_err(ErrorCarrier::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_from_error() {
        let carrier = ErrorCarrier::from(Error::ChannelNotOpen(3));
        assert_eq!(carrier.kind, ErrorKind::ChannelNotOpen);
        assert_eq!(carrier.message, "Channel 3 is not open");

        let carrier: ErrorCarrier = Error::from(uicc_apdu_core::Error::UnsupportedInstruction(0xD6)).into();
        assert_eq!(carrier.kind, ErrorKind::UnsupportedInstruction);
        assert_eq!(carrier.message, "Unsupported SIM I/O instruction: 0xD6");
    }

    #[test]
    fn test_kind_of_transcoding_errors() {
        let error = Error::from(uicc_apdu_core::Error::MalformedCommand {
            expected: 4,
            actual: 1,
        });
        assert_eq!(error.kind(), ErrorKind::MalformedCommand);
        assert_eq!(
            Error::Transmit(ProviderError::CardAbsent).kind(),
            ErrorKind::TransmitFailed
        );
    }
}
