//! Configuration options for the PC/SC provider

use pcsc::{Protocols as PcscProtocols, ShareMode as PcscShareMode};

/// Default number of GET RESPONSE or resend rounds per command
pub const DEFAULT_MAX_GET_RESPONSE: usize = 8;

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card (default)
    Shared,
    /// Direct connection to the reader
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// Configuration options for the PC/SC provider
#[derive(Debug, Clone)]
pub struct PcscConfig {
    /// Sharing mode for card connections
    pub share_mode: ShareMode,

    /// Preferred protocols for card communication
    pub protocols: PcscProtocols,

    /// Reconnect on next use if the card was reset
    pub auto_reconnect: bool,

    /// Class byte used for SELECT by path and READ commands of file exchanges
    pub file_class: u8,

    /// Upper bound on GET RESPONSE or resend rounds following one command
    pub max_get_response: usize,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            protocols: PcscProtocols::ANY,
            auto_reconnect: true,
            file_class: 0x00,
            max_get_response: DEFAULT_MAX_GET_RESPONSE,
        }
    }
}

impl PcscConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: PcscProtocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set whether to automatically reconnect
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Set the class byte of file exchanges (`0xA0` for GSM SIMs)
    pub const fn with_file_class(mut self, cla: u8) -> Self {
        self.file_class = cla;
        self
    }

    /// Set the GET RESPONSE bound
    pub const fn with_max_get_response(mut self, rounds: usize) -> Self {
        self.max_get_response = rounds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = PcscConfig::new()
            .with_share_mode(ShareMode::Exclusive)
            .with_auto_reconnect(false)
            .with_file_class(0xA0)
            .with_max_get_response(2);

        assert_eq!(config.share_mode, ShareMode::Exclusive);
        assert!(!config.auto_reconnect);
        assert_eq!(config.file_class, 0xA0);
        assert_eq!(config.max_get_response, 2);
        assert_eq!(config.protocols, PcscProtocols::ANY);
    }
}
