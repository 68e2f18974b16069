//! Logical channel multiplexer for a single UICC interface
//!
//! The card interface this crate sits on only knows how to transmit on the
//! basic channel, open a logical channel to an applet and close it again.
//! [`UiccTerminal`] lets several clients share it:
//!
//! - [`registry::ChannelRegistry`] hands out stable client-visible channel
//!   indices and maps them to provider handles
//! - [`dispatcher::CommandDispatcher`] routes raw commands to the basic or
//!   logical channel primitive according to the channel number in CLA
//! - [`file_io::FileIoAdapter`] translates legacy SIM file access commands
//! - [`provider::ChannelProvider`] is the capability performing the actual I/O
//!
//! Every fallible operation returns its failure as a value. Hosts exposing the
//! terminal over a boundary that cannot carry Rust errors can flatten them into
//! an [`ErrorCarrier`].
//!
//! ```
//! use uicc_terminal::mock::MockProvider;
//! use uicc_terminal::{TerminalConfig, UiccTerminal};
//!
//! let terminal = UiccTerminal::new(MockProvider::new(), TerminalConfig::default());
//! let opened = terminal
//!     .open_logical_channel(&[0xA0, 0x00, 0x00, 0x00, 0x03], 0x00)
//!     .unwrap()
//!     .expect("mock provider supports logical channels");
//! assert_eq!(opened.channel_index, 1);
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::Bytes;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod file_io;
pub mod mock;
pub mod provider;
pub mod registry;
pub mod terminal;

pub use config::TerminalConfig;
pub use dispatcher::{CommandDispatcher, OpenChannelResult};
pub use error::{Error, ErrorCarrier, ErrorKind, Result, carry};
pub use event::{EventReceiver, EventSender, TerminalEvent, event_channel};
pub use file_io::FileIoAdapter;
pub use provider::{ChannelProvider, OpenResponse, ProviderError, ProviderHandle};
pub use registry::ChannelRegistry;
pub use terminal::UiccTerminal;
