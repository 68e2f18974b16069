//! Error types for the PC/SC provider

use uicc_terminal::ProviderError;

use crate::status::StatusWord;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),

    /// Card was removed
    #[error("Card was removed")]
    CardRemoved,

    /// The card answered with an unexpected status word
    #[error("Card returned status {0}")]
    Status(StatusWord),

    /// The card answered with less than a status word
    #[error("Response too short: {0} bytes")]
    ShortResponse(usize),

    /// The provider handle does not name an ISO channel
    #[error("Invalid channel handle: {0}")]
    InvalidHandle(u32),

    /// The channel was closed by a card reset after it was opened
    #[error("Channel {0} was lost when the card was reset")]
    ChannelReset(u8),

    /// The AID does not fit in a short SELECT command
    #[error("AID too long: {0} bytes")]
    AidTooLong(usize),

    /// The file path is not a sequence of hex-encoded file identifiers
    #[error("Invalid file path: {0:?}")]
    InvalidPath(String),

    /// Command could not be encoded
    #[error(transparent)]
    Apdu(#[from] uicc_apdu_core::Error),
}

impl PcscError {
    /// Status word carried by this error, if the card produced one
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::Status(sw) => Some(*sw),
            _ => None,
        }
    }

    /// Whether this error means the card is gone
    pub const fn is_card_absent(&self) -> bool {
        matches!(
            self,
            Self::NoCard(_)
                | Self::CardRemoved
                | Self::Pcsc(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard)
        )
    }
}

impl From<PcscError> for ProviderError {
    fn from(error: PcscError) -> Self {
        if error.is_card_absent() {
            return Self::CardAbsent;
        }
        match error {
            PcscError::InvalidPath(_)
            | PcscError::InvalidHandle(_)
            | PcscError::AidTooLong(_)
            | PcscError::Apdu(_) => {
                Self::Unsupported(error.to_string())
            }
            other => Self::Communication(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        assert!(matches!(
            ProviderError::from(PcscError::Pcsc(pcsc::Error::RemovedCard)),
            ProviderError::CardAbsent
        ));
        assert!(matches!(
            ProviderError::from(PcscError::InvalidPath("3F0".into())),
            ProviderError::Unsupported(_)
        ));

        assert!(matches!(
            ProviderError::from(PcscError::ChannelReset(1)),
            ProviderError::Communication(_)
        ));

        let error = ProviderError::from(PcscError::Status(StatusWord::new(0x6A, 0x82)));
        assert_eq!(error.to_string(), "Communication error: Card returned status 6A82");
    }
}
