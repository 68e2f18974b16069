//! Raw exchanges with the card in one reader

use std::ffi::CString;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use pcsc::{Attribute, Card, Context, Disposition, ReaderState, State};
use tracing::{debug, trace, warn};

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::reader::card_present;

/// Byte-level link to a card
///
/// [`crate::PcscChannelProvider`] speaks ISO 7816-4 over a link; it never
/// touches PC/SC directly.
pub trait CardLink: Send + fmt::Debug {
    /// Send a raw command and return the raw response including the status word
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, PcscError>;

    /// Whether a card is present
    fn is_present(&self) -> bool;

    /// Answer To Reset of the card
    fn atr(&mut self) -> Result<Bytes, PcscError>;

    /// Number of times the card was reset or removed since the link was created
    ///
    /// Every logical channel opened before the last change is gone from the card.
    fn reset_generation(&self) -> u32 {
        0
    }
}

/// Card connection through a PC/SC reader
pub struct PcscConnection {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
    /// Card resets and removals seen so far
    generation: u32,
}

impl fmt::Debug for PcscConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscConnection")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .field("generation", &self.generation)
            .finish()
    }
}

impl PcscConnection {
    /// Create a connection to the card in `reader_name`
    ///
    /// A missing card is not an error; the connection is retried on next use.
    pub(crate) fn new(context: Context, reader_name: &str, config: PcscConfig) -> Self {
        let mut connection = Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            config,
            generation: 0,
        };

        if let Err(err) = connection.connect_card() {
            debug!(reader = %connection.reader_name, error = %err, "Card not connected yet");
        }

        connection
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Get the configuration
    pub const fn config(&self) -> &PcscConfig {
        &self.config
    }

    /// Check if a card connection is established
    pub const fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn reader_cstr(&self) -> Result<CString, PcscError> {
        CString::new(self.reader_name.as_str())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))
    }

    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader = self.reader_cstr()?;
        match self.context.connect(
            &reader,
            self.config.share_mode.into(),
            self.config.protocols,
        ) {
            Ok(card) => {
                debug!(reader = %self.reader_name, "Connected to card");
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name.clone())),
            Err(pcsc::Error::UnknownReader) => {
                Err(PcscError::ReaderNotFound(self.reader_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn transmit_once(&mut self, command: &[u8]) -> Result<Bytes, pcsc::Error> {
        let Some(card) = &self.card else {
            return Err(pcsc::Error::NoSmartcard);
        };

        let mut response_buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        card.transmit(command, &mut response_buffer)
            .map(Bytes::copy_from_slice)
    }
}

impl CardLink for PcscConnection {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, PcscError> {
        self.connect_card()?;
        trace!(command = %hex::encode_upper(command), "C-APDU");

        let response = match self.transmit_once(command) {
            Ok(response) => response,
            Err(e @ (pcsc::Error::ResetCard | pcsc::Error::RemovedCard)) => {
                // Drop the stale handle, the card has to be reconnected
                self.card = None;
                self.generation = self.generation.wrapping_add(1);

                if e == pcsc::Error::RemovedCard {
                    return Err(PcscError::CardRemoved);
                }
                if !self.config.auto_reconnect {
                    return Err(e.into());
                }

                warn!(reader = %self.reader_name, "Card was reset, reconnecting");
                self.connect_card()?;
                self.transmit_once(command)?
            }
            Err(e) => return Err(e.into()),
        };

        trace!(response = %hex::encode_upper(&response), "R-APDU");
        Ok(response)
    }

    fn is_present(&self) -> bool {
        let Ok(reader) = self.reader_cstr() else {
            return false;
        };

        let mut reader_states = [ReaderState::new(reader, State::UNAWARE)];
        match self
            .context
            .get_status_change(Some(Duration::ZERO), &mut reader_states)
        {
            Ok(()) => card_present(reader_states[0].event_state()),
            Err(err) => {
                debug!(reader = %self.reader_name, error = %err, "Reader state unavailable");
                false
            }
        }
    }

    fn atr(&mut self) -> Result<Bytes, PcscError> {
        self.connect_card()?;
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;
        let atr = card.get_attribute_owned(Attribute::AtrString)?;
        Ok(Bytes::from(atr))
    }

    fn reset_generation(&self) -> u32 {
        self.generation
    }
}

impl Drop for PcscConnection {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
