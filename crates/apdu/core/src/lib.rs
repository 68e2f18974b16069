//! Core types for transcoding APDU (Application Protocol Data Unit) commands
//!
//! This crate provides the stateless building blocks used to multiplex several
//! logical sessions over one smart card interface, following ISO/IEC 7816-4.
//!
//! ## Overview
//!
//! - [`channel`]: encoding and decoding of the logical channel number carried
//!   in the class byte (CLA)
//! - [`command`]: splitting a raw command buffer into its header, length and
//!   payload fields and serialising it back
//! - [`sim_io`]: translation of legacy SIM file access commands into the
//!   instruction codes of a modem-style file exchange primitive
//! - [`error`]: the transcoding error type
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod channel;
pub mod command;
pub mod error;
pub mod sim_io;

pub use channel::{
    MAX_CHANNEL, clear_channel_number, decode_channel_number, encode_channel_number,
};
pub use command::{Command, split_command};
pub use error::{Error, Result};
pub use sim_io::{FileCommand, FileInstruction, LegacyInstruction, decode_legacy_instruction};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut, Error, Result};

    pub use crate::channel::{clear_channel_number, decode_channel_number, encode_channel_number};
    pub use crate::command::{Command, split_command};
    pub use crate::sim_io::{FileCommand, FileInstruction, decode_legacy_instruction};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = split_command(&[0x01, 0xB0, 0x00, 0x00, 0x10]).unwrap();
        assert_eq!(cmd.cla, 0x01);
        assert_eq!(cmd.channel(), 1);
        assert_eq!(clear_channel_number(cmd.cla), 0x00);

        let file = decode_legacy_instruction(0xB2).unwrap();
        assert_eq!(file.instruction, FileInstruction::ReadRecord);
    }
}
