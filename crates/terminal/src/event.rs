//! Events emitted by a terminal to its host

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Notifications a terminal sends to its host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// The card became ready again; access rules should be re-read
    StateChanged {
        /// Configured action name hosts listen for
        action: String,
    },
}

/// Sender for terminal events
pub type EventSender = Sender<TerminalEvent>;
/// Receiver for terminal events
pub type EventReceiver = Receiver<TerminalEvent>;

/// Create an unbounded channel for terminal events
pub fn event_channel() -> (EventSender, EventReceiver) {
    unbounded()
}
