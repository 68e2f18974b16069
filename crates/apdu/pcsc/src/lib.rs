//! PC/SC channel provider for the UICC terminal
//!
//! This crate implements [`uicc_terminal::ChannelProvider`] for a card in a
//! PC/SC reader. Logical channels are managed with MANAGE CHANNEL and SELECT,
//! legacy file exchanges become SELECT by path followed by READ BINARY or READ
//! RECORD, and a [`CardMonitor`] reports card insertion so the host can call
//! [`uicc_terminal::UiccTerminal::on_card_state_refreshed`].
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use uicc_terminal::{TerminalConfig, UiccTerminal};
//! use uicc_transport_pcsc::PcscDeviceManager;
//!
//! let manager = PcscDeviceManager::new()?;
//! let reader = manager.first_reader_with_card()?;
//! println!("Connecting to reader: {}", reader.name());
//!
//! let provider = manager.open_provider(reader.name())?;
//! let terminal = UiccTerminal::new(provider, TerminalConfig::default());
//!
//! let aid = hex::decode("A000000003000000")?;
//! match terminal.open_logical_channel(&aid, 0x00)? {
//!     Some(opened) => println!("Channel {} opened", opened.channel_index),
//!     None => println!("Card has no logical channels"),
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
pub mod event;
mod link;
mod manager;
mod monitor;
mod provider;
mod reader;
pub mod status;

pub use config::{DEFAULT_MAX_GET_RESPONSE, PcscConfig, ShareMode};
pub use error::PcscError;
pub use event::{CardEvent, CardEventReceiver, CardEventSender, card_event_channel};
pub use link::{CardLink, PcscConnection};
pub use manager::PcscDeviceManager;
pub use monitor::CardMonitor;
pub use provider::PcscChannelProvider;
pub use reader::PcscReader;
pub use status::StatusWord;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};
