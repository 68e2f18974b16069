//! Device manager for PC/SC operations

use pcsc::{Context, ReaderState, Scope, State};
use tracing::debug;

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::link::PcscConnection;
use crate::monitor::CardMonitor;
use crate::provider::PcscChannelProvider;
use crate::reader::PcscReader;

/// Manager for PC/SC device operations
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
}

impl std::fmt::Debug for PcscDeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscDeviceManager").finish_non_exhaustive()
    }
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = match self.context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => return Err(PcscError::NoReadersAvailable),
            Err(err) => return Err(err.into()),
        };
        if readers.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut result = Vec::with_capacity(readers.len());
        for reader_name in readers {
            let mut reader_states = [ReaderState::new(reader_name.as_c_str(), State::UNAWARE)];

            match self.context.get_status_change(None, &mut reader_states) {
                Ok(()) => result.push(PcscReader::from_reader_state(&reader_states[0])),
                Err(err) => {
                    // If we can't get status, assume no card
                    debug!(reader = ?reader_name, error = %err, "Reader state unavailable");
                    result.push(PcscReader::new(
                        reader_name.to_string_lossy().into_owned(),
                        false,
                        None,
                    ));
                }
            }
        }

        Ok(result)
    }

    /// First reader holding a card
    pub fn first_reader_with_card(&self) -> Result<PcscReader, PcscError> {
        self.list_readers()?
            .into_iter()
            .find(PcscReader::has_card)
            .ok_or_else(|| PcscError::NoCard("No reader with card found".to_string()))
    }

    /// Open a channel provider on a specific reader
    pub fn open_provider(&self, reader_name: &str) -> Result<PcscChannelProvider, PcscError> {
        self.open_provider_with_config(reader_name, PcscConfig::default())
    }

    /// Open a channel provider on a specific reader with custom configuration
    pub fn open_provider_with_config(
        &self,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<PcscChannelProvider, PcscError> {
        let known = self
            .list_readers()?
            .iter()
            .any(|reader| reader.name() == reader_name);
        if !known {
            return Err(PcscError::ReaderNotFound(reader_name.to_string()));
        }

        let link = PcscConnection::new(self.context.clone(), reader_name, config.clone());
        Ok(PcscChannelProvider::new(link, config))
    }

    /// Create a card monitor for `reader_name`
    ///
    /// The monitor gets its own context so stopping it does not disturb
    /// providers opened from this manager.
    pub fn monitor(&self, reader_name: &str) -> Result<CardMonitor, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(CardMonitor::new(context, reader_name))
    }
}
