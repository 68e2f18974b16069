//! Scripted in-memory provider for tests and examples

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use uicc_apdu_core::{Command, FileCommand};

use crate::provider::{ChannelProvider, OpenResponse, ProviderError, ProviderHandle};

/// A call received by [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// `open(aid)`
    Open(Bytes),
    /// `close(handle)`
    Close(ProviderHandle),
    /// `transmit_basic(command)`
    TransmitBasic(Command),
    /// `transmit_logical(handle, command)`
    TransmitLogical(ProviderHandle, Command),
    /// `exchange_file(file_id, command, path)`
    ExchangeFile {
        /// File identifier
        file_id: u16,
        /// Translated command
        command: FileCommand,
        /// Path forwarded by the terminal
        path: String,
    },
    /// `atr()`
    Atr,
}

/// Shared log of calls, readable after the provider moved into a terminal
pub type CallLog = Arc<Mutex<Vec<ProviderCall>>>;

/// Provider answering from a script
///
/// Unscripted opens succeed with increasing handles starting at 1 and a
/// `90 00` select response, closes succeed, and transmissions return the
/// configured default response.
#[derive(Debug)]
pub struct MockProvider {
    open_responses: VecDeque<OpenResponse>,
    close_results: VecDeque<bool>,
    transmit_results: VecDeque<Result<Bytes, String>>,
    default_response: Bytes,
    next_handle: u32,
    card_present: bool,
    atr: Option<Bytes>,
    calls: CallLog,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a provider with a card present and no script
    pub fn new() -> Self {
        Self {
            open_responses: VecDeque::new(),
            close_results: VecDeque::new(),
            transmit_results: VecDeque::new(),
            default_response: Bytes::from_static(&[0x90, 0x00]),
            next_handle: 1,
            card_present: true,
            atr: None,
            calls: CallLog::default(),
        }
    }

    /// Queue the outcome of the next open
    pub fn with_open_response(mut self, response: OpenResponse) -> Self {
        self.open_responses.push_back(response);
        self
    }

    /// Queue the outcome of the next close
    pub fn with_close_result(mut self, result: bool) -> Self {
        self.close_results.push_back(result);
        self
    }

    /// Queue a response for the next transmission or file exchange
    pub fn with_response(mut self, response: impl Into<Bytes>) -> Self {
        self.transmit_results.push_back(Ok(response.into()));
        self
    }

    /// Queue a failure for the next transmission or file exchange
    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.transmit_results.push_back(Err(reason.into()));
        self
    }

    /// Set the response returned once the script runs out
    pub fn with_default_response(mut self, response: impl Into<Bytes>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Expose an ATR
    pub fn with_atr(mut self, atr: impl Into<Bytes>) -> Self {
        self.atr = Some(atr.into());
        self
    }

    /// Report no card in the interface
    pub const fn without_card(mut self) -> Self {
        self.card_present = false;
        self
    }

    /// Handle to the log of received calls
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().push(call);
    }

    fn next_result(&mut self) -> Result<Bytes, ProviderError> {
        match self.transmit_results.pop_front() {
            Some(result) => result.map_err(ProviderError::Communication),
            None => Ok(self.default_response.clone()),
        }
    }
}

impl ChannelProvider for MockProvider {
    fn open(&mut self, aid: &[u8]) -> OpenResponse {
        self.record(ProviderCall::Open(Bytes::copy_from_slice(aid)));
        self.open_responses.pop_front().unwrap_or_else(|| {
            let handle = ProviderHandle(self.next_handle);
            self.next_handle += 1;
            OpenResponse::Opened {
                handle,
                select_response: Bytes::from_static(&[0x90, 0x00]),
            }
        })
    }

    fn close(&mut self, handle: ProviderHandle) -> bool {
        self.record(ProviderCall::Close(handle));
        self.close_results.pop_front().unwrap_or(true)
    }

    fn transmit_basic(&mut self, command: &Command) -> Result<Bytes, ProviderError> {
        self.record(ProviderCall::TransmitBasic(command.clone()));
        self.next_result()
    }

    fn transmit_logical(
        &mut self,
        handle: ProviderHandle,
        command: &Command,
    ) -> Result<Bytes, ProviderError> {
        self.record(ProviderCall::TransmitLogical(handle, command.clone()));
        self.next_result()
    }

    fn exchange_file(
        &mut self,
        file_id: u16,
        command: &FileCommand,
        path: &str,
    ) -> Result<Bytes, ProviderError> {
        self.record(ProviderCall::ExchangeFile {
            file_id,
            command: *command,
            path: path.to_string(),
        });
        self.next_result()
    }

    fn card_present(&self) -> bool {
        self.card_present
    }

    fn atr(&mut self) -> Option<Bytes> {
        self.record(ProviderCall::Atr);
        self.atr.clone()
    }
}
