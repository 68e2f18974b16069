//! The channel provider capability
//!
//! A provider is the only component performing I/O. It knows how to open and
//! close logical channels on the physical interface and how to transmit on
//! them; it knows nothing about client-visible channel indices.

use std::fmt;

use bytes::Bytes;
use derive_more::Display;
use uicc_apdu_core::{Command, FileCommand};

/// Opaque identifier of a logical channel opened by a provider
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("{_0}")]
pub struct ProviderHandle(pub u32);

/// Outcome of a provider-level open request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenResponse {
    /// The channel was opened and the applet selected
    Opened {
        /// Handle for subsequent transmit and close calls
        handle: ProviderHandle,
        /// Response to the implicit SELECT
        select_response: Bytes,
    },
    /// The platform lacks the resources or capability to open a channel
    MissingResource,
    /// No applet matches the AID
    NoSuchElement,
    /// Any other failure
    Failed(String),
}

/// Provider-level I/O failure
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No card is present in the interface
    #[error("No card present")]
    CardAbsent,

    /// The interface rejected or failed to complete the exchange
    #[error("Communication error: {0}")]
    Communication(String),

    /// The request cannot be expressed on this interface
    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

/// Capability executing channel operations on the physical interface
///
/// Calls are synchronous and may block on hardware. They are made while the
/// terminal's session lock is held, so implementations must not call back
/// into the terminal.
pub trait ChannelProvider: Send + fmt::Debug {
    /// Open a logical channel and select the applet identified by `aid`
    fn open(&mut self, aid: &[u8]) -> OpenResponse;

    /// Close a logical channel, returning whether the provider succeeded
    fn close(&mut self, handle: ProviderHandle) -> bool;

    /// Transmit on the basic channel
    ///
    /// The command's class byte has its channel bits cleared.
    fn transmit_basic(&mut self, command: &Command) -> Result<Bytes, ProviderError>;

    /// Transmit on a logical channel previously opened by [`Self::open`]
    ///
    /// The command's class byte has its channel bits cleared; addressing the
    /// channel is up to the provider.
    fn transmit_logical(
        &mut self,
        handle: ProviderHandle,
        command: &Command,
    ) -> Result<Bytes, ProviderError>;

    /// Exchange a translated legacy file command against `file_id` under `path`
    fn exchange_file(
        &mut self,
        file_id: u16,
        command: &FileCommand,
        path: &str,
    ) -> Result<Bytes, ProviderError>;

    /// Whether a card is present in the interface
    fn card_present(&self) -> bool;

    /// Answer To Reset of the card, if the platform exposes it
    fn atr(&mut self) -> Option<Bytes> {
        None
    }
}

impl<P: ChannelProvider + ?Sized> ChannelProvider for Box<P> {
    fn open(&mut self, aid: &[u8]) -> OpenResponse {
        (**self).open(aid)
    }

    fn close(&mut self, handle: ProviderHandle) -> bool {
        (**self).close(handle)
    }

    fn transmit_basic(&mut self, command: &Command) -> Result<Bytes, ProviderError> {
        (**self).transmit_basic(command)
    }

    fn transmit_logical(
        &mut self,
        handle: ProviderHandle,
        command: &Command,
    ) -> Result<Bytes, ProviderError> {
        (**self).transmit_logical(handle, command)
    }

    fn exchange_file(
        &mut self,
        file_id: u16,
        command: &FileCommand,
        path: &str,
    ) -> Result<Bytes, ProviderError> {
        (**self).exchange_file(file_id, command, path)
    }

    fn card_present(&self) -> bool {
        (**self).card_present()
    }

    fn atr(&mut self) -> Option<Bytes> {
        (**self).atr()
    }
}
