//! Command routing between clients and the channel provider
//!
//! The dispatcher owns the channel registry and the provider. It is not
//! synchronised itself; [`crate::UiccTerminal`] wraps it in the session lock.

use bytes::Bytes;
use tracing::{debug, instrument, trace, warn};
use uicc_apdu_core::split_command;

use crate::provider::{ChannelProvider, OpenResponse};
use crate::registry::{BASIC_CHANNEL, ChannelRegistry};
use crate::{Error, Result};

/// A successfully opened logical channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelResult {
    /// Client-visible channel index, to be encoded in the CLA of later commands
    pub channel_index: usize,
    /// Response to the applet selection
    pub select_response: Bytes,
}

/// Routes open, close and transmit requests to a [`ChannelProvider`]
#[derive(Debug)]
pub struct CommandDispatcher<P> {
    registry: ChannelRegistry,
    provider: P,
}

impl<P: ChannelProvider> CommandDispatcher<P> {
    /// Create a dispatcher with an empty channel table
    pub fn new(provider: P) -> Self {
        Self::with_registry(provider, ChannelRegistry::new())
    }

    /// Create a dispatcher over an existing registry
    pub const fn with_registry(provider: P, registry: ChannelRegistry) -> Self {
        Self { registry, provider }
    }

    /// Get a reference to the channel registry
    pub const fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Get a reference to the provider
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Get a mutable reference to the provider
    pub const fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Open a logical channel to the applet identified by `aid`
    ///
    /// Returns `Ok(None)` when the platform cannot open logical channels at
    /// all. `p2` (the SELECT P2 the client asked for) is accepted for
    /// compatibility but not forwarded: the provider always selects with its
    /// own default.
    #[instrument(level = "debug", skip(self, aid), fields(aid = %hex::encode_upper(aid)))]
    pub fn open_logical_channel(
        &mut self,
        aid: &[u8],
        p2: u8,
    ) -> Result<Option<OpenChannelResult>> {
        debug!(p2, "Ignoring P2, provider selects with its default");

        // Fail before the provider opens a channel we could not track
        self.registry.ensure_capacity()?;

        match self.provider.open(aid) {
            OpenResponse::Opened {
                handle,
                select_response,
            } => {
                let channel_index = self.registry.allocate()?;
                self.registry.bind(channel_index, handle);
                debug!(
                    channel_index,
                    %handle,
                    select_response = %hex::encode_upper(&select_response),
                    "Logical channel opened"
                );
                Ok(Some(OpenChannelResult {
                    channel_index,
                    select_response,
                }))
            }
            OpenResponse::MissingResource => {
                debug!("Provider cannot open logical channels");
                Ok(None)
            }
            OpenResponse::NoSuchElement => {
                debug!("Applet not found");
                Err(Error::AppletNotFound)
            }
            OpenResponse::Failed(reason) => {
                warn!(%reason, "Opening logical channel failed");
                Err(Error::ChannelOpenFailed(reason))
            }
        }
    }

    /// Close a logical channel
    ///
    /// Closing the basic channel is a no-op. If the provider fails to close
    /// the channel, it stays open.
    #[instrument(level = "debug", skip(self))]
    pub fn close_logical_channel(&mut self, channel_index: usize) -> Result<()> {
        if channel_index == BASIC_CHANNEL {
            return Ok(());
        }

        let handle = self.registry.handle_of(channel_index)?;
        if !self.provider.close(handle) {
            warn!(%handle, "Provider failed to close logical channel");
            return Err(Error::CloseFailed(channel_index));
        }
        self.registry.free(channel_index)?;
        debug!(%handle, "Logical channel closed");

        Ok(())
    }

    /// Transmit a raw command on the channel encoded in its class byte
    #[instrument(level = "trace", skip_all)]
    pub fn transmit(&mut self, raw: &[u8]) -> Result<Bytes> {
        trace!(command = %hex::encode_upper(raw), "Transmitting command");

        let command = split_command(raw)?;
        let channel_index = usize::from(command.channel());
        let command = command.without_channel();

        let response = if channel_index == BASIC_CHANNEL {
            self.provider.transmit_basic(&command)
        } else {
            let handle = self.registry.handle_of(channel_index)?;
            self.provider.transmit_logical(handle, &command)
        };

        match response {
            Ok(bytes) => {
                trace!(response = %hex::encode_upper(&bytes), "Received response");
                Ok(bytes)
            }
            Err(err) => {
                warn!(channel_index, error = %err, "Transmit failed");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, ProviderCall};
    use crate::provider::ProviderHandle;
    use crate::ErrorKind;
    use hex_literal::hex;
    use uicc_apdu_core::Command;

    const AID: [u8; 8] = hex!("A000000003000000");

    fn opened(handle: u32) -> OpenResponse {
        OpenResponse::Opened {
            handle: ProviderHandle(handle),
            select_response: Bytes::from_static(&[0x90, 0x00]),
        }
    }

    #[test]
    fn test_open_first_channel_is_one() {
        let provider = MockProvider::new().with_open_response(opened(7));
        let calls = provider.call_log();
        let mut dispatcher = CommandDispatcher::new(provider);

        let result = dispatcher.open_logical_channel(&AID, 0x00).unwrap().unwrap();
        assert_eq!(result.channel_index, 1);
        assert_eq!(result.select_response.as_ref(), &hex!("9000"));
        assert_eq!(dispatcher.registry().handle_of(1).unwrap(), ProviderHandle(7));
        assert_eq!(
            calls.lock().as_slice(),
            &[ProviderCall::Open(Bytes::copy_from_slice(&AID))]
        );
    }

    #[test]
    fn test_close_then_reopen_reuses_index() {
        let provider = MockProvider::new()
            .with_open_response(opened(7))
            .with_open_response(opened(8));
        let calls = provider.call_log();
        let mut dispatcher = CommandDispatcher::new(provider);

        dispatcher.open_logical_channel(&AID, 0x00).unwrap();
        dispatcher.close_logical_channel(1).unwrap();
        assert!(!dispatcher.registry().is_open(1));
        assert!(calls.lock().contains(&ProviderCall::Close(ProviderHandle(7))));

        let result = dispatcher.open_logical_channel(&AID, 0x04).unwrap().unwrap();
        assert_eq!(result.channel_index, 1);
        assert_eq!(dispatcher.registry().handle_of(1).unwrap(), ProviderHandle(8));
    }

    #[test]
    fn test_open_missing_resource_is_not_an_error() {
        let mut dispatcher =
            CommandDispatcher::new(MockProvider::new().with_open_response(OpenResponse::MissingResource));

        assert_eq!(dispatcher.open_logical_channel(&AID, 0x00).unwrap(), None);
        assert_eq!(dispatcher.registry().len(), 1);
    }

    #[test]
    fn test_open_failures() {
        let mut dispatcher = CommandDispatcher::new(
            MockProvider::new()
                .with_open_response(OpenResponse::NoSuchElement)
                .with_open_response(OpenResponse::Failed("modem busy".into())),
        );

        let err = dispatcher.open_logical_channel(&AID, 0x00).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AppletNotFound);

        let err = dispatcher.open_logical_channel(&AID, 0x00).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelOpenFailed);
        assert_eq!(dispatcher.registry().open_channels().count(), 0);
    }

    #[test]
    fn test_open_without_capacity_does_not_reach_provider() {
        let provider = MockProvider::new();
        let calls = provider.call_log();
        let mut dispatcher =
            CommandDispatcher::with_registry(provider, ChannelRegistry::with_max_logical_channels(1));

        dispatcher.open_logical_channel(&AID, 0x00).unwrap();
        let err = dispatcher.open_logical_channel(&AID, 0x00).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelOpenFailed);
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_close_basic_channel_is_noop() {
        let provider = MockProvider::new();
        let calls = provider.call_log();
        let mut dispatcher = CommandDispatcher::new(provider);

        dispatcher.close_logical_channel(0).unwrap();
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_close_failures() {
        let mut dispatcher =
            CommandDispatcher::new(MockProvider::new().with_close_result(false));

        let err = dispatcher.close_logical_channel(1).unwrap_err();
        assert!(matches!(err, Error::ChannelNotOpen(1)));

        dispatcher.open_logical_channel(&AID, 0x00).unwrap();
        let err = dispatcher.close_logical_channel(1).unwrap_err();
        assert!(matches!(err, Error::CloseFailed(1)));
        // Still open after the provider refused
        assert!(dispatcher.registry().is_open(1));
    }

    #[test]
    fn test_transmit_basic_channel() {
        let provider = MockProvider::new().with_response(hex!("6F1A9000").to_vec());
        let calls = provider.call_log();
        let mut dispatcher = CommandDispatcher::new(provider);

        let response = dispatcher.transmit(&hex!("00A40400023F00")).unwrap();
        assert_eq!(response.as_ref(), &hex!("6F1A9000"));

        let expected = Command::new(0x00, 0xA4, 0x04, 0x00).with_data(hex!("3F00").to_vec());
        assert_eq!(calls.lock().as_slice(), &[ProviderCall::TransmitBasic(expected)]);
    }

    #[test]
    fn test_transmit_logical_channel_clears_cla() {
        let provider = MockProvider::new().with_open_response(opened(42));
        let calls = provider.call_log();
        let mut dispatcher = CommandDispatcher::new(provider);
        dispatcher.open_logical_channel(&AID, 0x00).unwrap();

        dispatcher.transmit(&hex!("81CA9F7F00")).unwrap();

        let expected = Command::new(0x80, 0xCA, 0x9F, 0x7F).with_p3(0x00);
        assert_eq!(
            calls.lock().last(),
            Some(&ProviderCall::TransmitLogical(ProviderHandle(42), expected))
        );
    }

    #[test]
    fn test_transmit_on_free_slot_fails() {
        let provider = MockProvider::new();
        let calls = provider.call_log();
        let mut dispatcher = CommandDispatcher::new(provider);
        dispatcher.open_logical_channel(&AID, 0x00).unwrap();
        dispatcher.close_logical_channel(1).unwrap();
        let before = calls.lock().len();

        let err = dispatcher.transmit(&hex!("01B0000000")).unwrap_err();
        assert!(matches!(err, Error::ChannelNotOpen(1)));
        // Channel 5 was never allocated
        let err = dispatcher.transmit(&hex!("41B0000000")).unwrap_err();
        assert!(matches!(err, Error::ChannelNotOpen(5)));

        assert_eq!(calls.lock().len(), before);
        assert_eq!(dispatcher.registry().len(), 2);
        assert!(!dispatcher.registry().is_open(1));
    }

    #[test]
    fn test_transmit_malformed_and_failed() {
        let mut dispatcher = CommandDispatcher::new(MockProvider::new().with_failure("timeout"));

        let err = dispatcher.transmit(&hex!("00A4")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedCommand);

        let err = dispatcher.transmit(&hex!("00A40400")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransmitFailed);
    }
}
