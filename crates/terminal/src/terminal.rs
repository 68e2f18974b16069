//! Session-level host surface
//!
//! A [`UiccTerminal`] is created once per session. All channel state lives
//! behind a single lock so that allocation, validity checks and the provider
//! call that depends on them happen atomically with respect to other clients.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::config::TerminalConfig;
use crate::dispatcher::{CommandDispatcher, OpenChannelResult};
use crate::event::{EventSender, TerminalEvent};
use crate::file_io::FileIoAdapter;
use crate::provider::{ChannelProvider, ProviderHandle};
use crate::registry::ChannelRegistry;
use crate::Result;

/// State guarded by the session lock
#[derive(Debug)]
struct Session<P> {
    dispatcher: CommandDispatcher<P>,
    file_io: FileIoAdapter,
    atr: Option<Bytes>,
}

/// Logical channel multiplexer over one [`ChannelProvider`]
pub struct UiccTerminal<P> {
    session: Mutex<Session<P>>,
    config: TerminalConfig,
    events: Option<EventSender>,
    refreshes: AtomicU64,
}

impl<P: ChannelProvider> fmt::Debug for UiccTerminal<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiccTerminal")
            .field("config", &self.config)
            .field("has_event_sender", &self.events.is_some())
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

impl<P: ChannelProvider> UiccTerminal<P> {
    /// Create a terminal session over `provider`
    pub fn new(provider: P, config: TerminalConfig) -> Self {
        let registry = ChannelRegistry::with_max_logical_channels(config.max_logical_channels);
        Self {
            session: Mutex::new(Session {
                dispatcher: CommandDispatcher::with_registry(provider, registry),
                file_io: FileIoAdapter::new(),
                atr: None,
            }),
            config,
            events: None,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Deliver [`TerminalEvent`]s to `sender`
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Get the session configuration
    pub const fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// Open a logical channel to `aid`
    ///
    /// `Ok(None)` means the platform does not support logical channels.
    pub fn open_logical_channel(&self, aid: &[u8], p2: u8) -> Result<Option<OpenChannelResult>> {
        self.session.lock().dispatcher.open_logical_channel(aid, p2)
    }

    /// Close the logical channel at `channel_index`
    pub fn close_logical_channel(&self, channel_index: usize) -> Result<()> {
        self.session
            .lock()
            .dispatcher
            .close_logical_channel(channel_index)
    }

    /// Transmit a raw command and return the raw response
    pub fn transmit(&self, command: &[u8]) -> Result<Bytes> {
        self.session.lock().dispatcher.transmit(command)
    }

    /// Exchange a legacy SIM file access command
    ///
    /// An empty `path` reuses the path of the previous exchange.
    pub fn exchange_legacy_file(&self, file_id: u16, path: &str, command: &[u8]) -> Result<Bytes> {
        let mut session = self.session.lock();
        let Session {
            dispatcher,
            file_io,
            ..
        } = &mut *session;
        file_io.exchange(dispatcher.provider_mut(), file_id, path, command)
    }

    /// Whether a card is present
    pub fn is_card_present(&self) -> bool {
        self.session.lock().dispatcher.provider().card_present()
    }

    /// Answer To Reset of the card
    ///
    /// `None` when the platform gives no access to it. The first ATR read is
    /// kept for the rest of the session.
    pub fn atr(&self) -> Option<Bytes> {
        let mut session = self.session.lock();
        if session.atr.is_none() {
            session.atr = session
                .dispatcher
                .provider_mut()
                .atr()
                .filter(|atr| !atr.is_empty());
            match &session.atr {
                Some(atr) => trace!(atr = %hex::encode_upper(atr), "ATR read"),
                None => debug!("ATR not available on this platform"),
            }
        }
        session.atr.clone()
    }

    /// Path currently used for legacy file exchanges
    pub fn current_file_path(&self) -> String {
        self.session.lock().file_io.current_path().to_string()
    }

    /// Open logical channels as `(index, handle)` pairs
    pub fn open_channels(&self) -> Vec<(usize, ProviderHandle)> {
        self.session
            .lock()
            .dispatcher
            .registry()
            .open_channels()
            .collect()
    }

    /// Hook for the host to call once the card became ready or loaded
    ///
    /// Announces [`TerminalEvent::StateChanged`] so listeners can re-read
    /// access rules. Does not take the session lock.
    pub fn on_card_state_refreshed(&self) {
        let count = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;
        info!(count, "Card state refreshed, access rules may need an update");

        if let Some(sender) = &self.events {
            let event = TerminalEvent::StateChanged {
                action: self.config.state_changed_action.clone(),
            };
            if sender.send(event).is_err() {
                debug!("No listener for terminal events");
            }
        }
    }

    /// Action name announced on state refresh
    pub fn state_changed_action(&self) -> &str {
        &self.config.state_changed_action
    }

    /// Number of times [`Self::on_card_state_refreshed`] was called
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}
