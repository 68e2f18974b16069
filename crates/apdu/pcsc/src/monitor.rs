//! Card presence monitor for one reader

use std::ffi::CString;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use pcsc::{Context, ReaderState, State};
use tracing::{debug, info, warn};

use crate::error::PcscError;
use crate::event::{CardEvent, CardEventSender};
use crate::reader::card_present;

/// How long a single status wait may block
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Turns successive reader observations into insertion and removal events
#[derive(Debug, Clone, Default)]
pub(crate) struct PresenceTracker {
    /// ATR of the card last seen, `None` when the reader was empty
    last: Option<Option<Bytes>>,
}

impl PresenceTracker {
    /// Record an observation, returning an event if the card changed
    pub(crate) fn observe(&mut self, reader: &str, present: bool, atr: &[u8]) -> Option<CardEvent> {
        let current = present.then(|| Bytes::copy_from_slice(atr));
        let previous = self.last.replace(current.clone());

        match (previous, current) {
            // A different card counts as a new insertion
            (prev, Some(atr)) if prev.as_ref().and_then(Option::as_ref) != Some(&atr) => {
                Some(CardEvent::Inserted {
                    reader: reader.to_string(),
                    atr,
                })
            }
            (Some(Some(_)), None) => Some(CardEvent::Removed {
                reader: reader.to_string(),
            }),
            _ => None,
        }
    }
}

/// Watches one reader on a background thread and reports card events
///
/// The first observation reports a card already present as inserted. The
/// thread stops when [`CardMonitor::stop`] is called, the monitor is dropped or
/// the receiving end of the event channel goes away.
pub struct CardMonitor {
    context: Context,
    reader: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CardMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardMonitor")
            .field("reader", &self.reader)
            .field("running", &self.is_running())
            .finish()
    }
}

impl CardMonitor {
    pub(crate) fn new(context: Context, reader: &str) -> Self {
        Self {
            context,
            reader: reader.to_string(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Name of the watched reader
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// Whether the monitor thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start reporting events to `sender`
    pub fn start(&mut self, sender: CardEventSender) -> Result<(), PcscError> {
        if self.is_running() {
            return Ok(());
        }

        let reader = CString::new(self.reader.as_str())
            .map_err(|_| PcscError::ReaderNotFound(self.reader.clone()))?;
        let context = self.context.clone();
        let running = Arc::clone(&self.running);
        let name = self.reader.clone();

        running.store(true, Ordering::Release);
        self.handle = Some(thread::spawn(move || {
            watch(&context, reader, &name, &running, &sender);
            running.store(false, Ordering::Release);
        }));

        debug!(reader = %self.reader, "Card monitor started");
        Ok(())
    }

    /// Stop the monitor thread and wait for it to exit
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        // Wake up a pending status wait
        if let Err(err) = self.context.cancel() {
            debug!(error = %err, "Cancelling status wait failed");
        }
        if handle.join().is_err() {
            warn!(reader = %self.reader, "Card monitor thread panicked");
        }
        debug!(reader = %self.reader, "Card monitor stopped");
    }
}

impl Drop for CardMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(
    context: &Context,
    reader: CString,
    name: &str,
    running: &AtomicBool,
    sender: &CardEventSender,
) {
    let mut states = [ReaderState::new(reader, State::UNAWARE)];
    let mut tracker = PresenceTracker::default();

    while running.load(Ordering::Acquire) {
        match context.get_status_change(Some(POLL_INTERVAL), &mut states) {
            Ok(()) => {
                let state = &mut states[0];
                let event_state = state.event_state();
                if event_state.contains(State::UNKNOWN) {
                    warn!(reader = %name, "Reader disappeared");
                    break;
                }

                if let Some(event) = tracker.observe(name, card_present(event_state), state.atr()) {
                    info!(?event, "Card event");
                    if sender.send(event).is_err() {
                        debug!("Card event receiver dropped");
                        break;
                    }
                }
                state.sync_current_state();
            }
            Err(pcsc::Error::Timeout | pcsc::Error::Cancelled) => {}
            Err(err) => {
                warn!(reader = %name, error = %err, "Waiting for reader state failed");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const ATR: [u8; 4] = hex!("3B9F9680");

    #[test]
    fn test_card_present_at_start_is_inserted() {
        let mut tracker = PresenceTracker::default();
        assert_eq!(
            tracker.observe("Reader 0", true, &ATR),
            Some(CardEvent::Inserted {
                reader: "Reader 0".to_string(),
                atr: Bytes::copy_from_slice(&ATR),
            })
        );
        assert_eq!(tracker.observe("Reader 0", true, &ATR), None);
    }

    #[test]
    fn test_empty_reader_at_start_is_silent() {
        let mut tracker = PresenceTracker::default();
        assert_eq!(tracker.observe("Reader 0", false, &[]), None);
        assert_eq!(tracker.observe("Reader 0", false, &[]), None);
    }

    #[test]
    fn test_removal_and_swap() {
        let mut tracker = PresenceTracker::default();
        tracker.observe("Reader 0", true, &ATR);

        assert_eq!(
            tracker.observe("Reader 0", false, &[]),
            Some(CardEvent::Removed {
                reader: "Reader 0".to_string()
            })
        );
        assert!(matches!(
            tracker.observe("Reader 0", true, &ATR),
            Some(CardEvent::Inserted { .. })
        ));
        // Another card without an observed removal in between
        assert!(matches!(
            tracker.observe("Reader 0", true, &hex!("3B00")),
            Some(CardEvent::Inserted { .. })
        ));
    }
}
