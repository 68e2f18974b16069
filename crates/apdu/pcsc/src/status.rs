//! Status words returned by the card

use derive_more::Display;

use crate::error::PcscError;

/// Trailing `SW1 SW2` of a response
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{sw1:02X}{sw2:02X}")]
pub struct StatusWord {
    /// First status byte
    pub sw1: u8,
    /// Second status byte
    pub sw2: u8,
}

impl StatusWord {
    /// Normal processing
    pub const OK: Self = Self::new(0x90, 0x00);
    /// Logical channel not supported
    pub const CHANNEL_NOT_SUPPORTED: Self = Self::new(0x68, 0x81);
    /// Function not supported
    pub const FUNCTION_NOT_SUPPORTED: Self = Self::new(0x6A, 0x81);
    /// File or application not found
    pub const NOT_FOUND: Self = Self::new(0x6A, 0x82);

    /// Create a status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// `90 00`
    pub const fn is_success(self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// `62 xx` or `63 xx`: processed with a warning
    pub const fn is_warning(self) -> bool {
        matches!(self.sw1, 0x62 | 0x63)
    }

    /// Number of bytes waiting for GET RESPONSE (`61 xx`)
    pub const fn bytes_available(self) -> Option<u8> {
        if self.sw1 == 0x61 {
            Some(self.sw2)
        } else {
            None
        }
    }

    /// Length the card wants the command resent with (`6C xx`)
    pub const fn corrected_length(self) -> Option<u8> {
        if self.sw1 == 0x6C {
            Some(self.sw2)
        } else {
            None
        }
    }

    /// Whether the card could not provide a logical channel
    pub const fn is_missing_channel(self) -> bool {
        matches!(
            self,
            Self::CHANNEL_NOT_SUPPORTED | Self::FUNCTION_NOT_SUPPORTED
        )
    }
}

/// Split a response into its body and status word
pub fn split_response(response: &[u8]) -> Result<(&[u8], StatusWord), PcscError> {
    match response {
        [body @ .., sw1, sw2] => Ok((body, StatusWord::new(*sw1, *sw2))),
        _ => Err(PcscError::ShortResponse(response.len())),
    }
}
