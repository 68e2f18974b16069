//! Configuration options for a terminal session

use uicc_apdu_core::MAX_CHANNEL;

/// Default cap on simultaneously allocated logical channels
///
/// Channel indices travel in the class byte, which cannot address more than
/// channel 19.
pub const DEFAULT_MAX_LOGICAL_CHANNELS: usize = MAX_CHANNEL as usize;

/// Action name announced when the card state has been refreshed
pub const DEFAULT_STATE_CHANGED_ACTION: &str =
    "org.simalliance.openmobileapi.action.SIM_STATE_CHANGED";

/// Configuration options for [`crate::UiccTerminal`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalConfig {
    /// Maximum number of logical channel slots
    pub max_logical_channels: usize,

    /// Action name carried by [`crate::TerminalEvent::StateChanged`]
    pub state_changed_action: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            max_logical_channels: DEFAULT_MAX_LOGICAL_CHANNELS,
            state_changed_action: DEFAULT_STATE_CHANGED_ACTION.to_string(),
        }
    }
}

impl TerminalConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of logical channel slots
    ///
    /// Values above [`DEFAULT_MAX_LOGICAL_CHANNELS`] are clamped to it.
    pub const fn with_max_logical_channels(mut self, max: usize) -> Self {
        self.max_logical_channels = if max > DEFAULT_MAX_LOGICAL_CHANNELS {
            DEFAULT_MAX_LOGICAL_CHANNELS
        } else {
            max
        };
        self
    }

    /// Set the action name announced on state refresh
    pub fn with_state_changed_action(mut self, action: impl Into<String>) -> Self {
        self.state_changed_action = action.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_logical_channels_is_clamped() {
        assert_eq!(TerminalConfig::new().with_max_logical_channels(4).max_logical_channels, 4);
        assert_eq!(
            TerminalConfig::new().with_max_logical_channels(25).max_logical_channels,
            DEFAULT_MAX_LOGICAL_CHANNELS
        );
    }
}
