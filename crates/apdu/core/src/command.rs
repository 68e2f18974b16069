//! Raw command buffer handling
//!
//! The multiplexer does not interpret Lc/Le: a command is its four header
//! bytes, an optional fifth byte (P3) and whatever follows as payload. This is
//! the form expected by basic and logical channel transmit primitives.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::{clear_channel_number, decode_channel_number, encode_channel_number};
use crate::{Error, Result};

/// Length of the mandatory `CLA INS P1 P2` header
pub const HEADER_LEN: usize = 4;

/// Parsed form of a raw command buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Length byte (Lc or Le), if present
    pub p3: Option<u8>,
    /// Bytes following P3, if any
    pub data: Option<Bytes>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            p3: None,
            data: None,
        }
    }

    /// Set the length byte
    pub const fn with_p3(mut self, p3: u8) -> Self {
        self.p3 = Some(p3);
        self
    }

    /// Set the payload, along with a matching length byte
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        let data = data.into();
        self.p3 = Some(data.len() as u8);
        self.data = Some(data);
        self
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_LEN {
            return Err(Error::MalformedCommand {
                expected: HEADER_LEN,
                actual: raw.len(),
            });
        }

        let mut command = Self::new(raw[0], raw[1], raw[2], raw[3]);
        if raw.len() > HEADER_LEN {
            command.p3 = Some(raw[HEADER_LEN]);
        }
        if raw.len() > HEADER_LEN + 1 {
            command.data = Some(Bytes::copy_from_slice(&raw[HEADER_LEN + 1..]));
        }

        Ok(command)
    }

    /// Logical channel addressed by the class byte
    pub const fn channel(&self) -> u8 {
        decode_channel_number(self.cla)
    }

    /// Copy of the command with the channel bits of CLA zeroed
    pub fn without_channel(&self) -> Self {
        Self {
            cla: clear_channel_number(self.cla),
            ..self.clone()
        }
    }

    /// Copy of the command addressed to another logical channel
    pub fn on_channel(&self, channel: u8) -> Result<Self> {
        Ok(Self {
            cla: encode_channel_number(self.cla, channel)?,
            ..self.clone()
        })
    }

    /// Payload as a slice, if any
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        HEADER_LEN + usize::from(self.p3.is_some()) + self.data.as_ref().map_or(0, Bytes::len)
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(p3) = self.p3 {
            buffer.put_u8(p3);
        }
        if let Some(data) = &self.data {
            buffer.put_slice(data);
        }

        buffer.freeze()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}",
            self.cla, self.ins, self.p1, self.p2
        )?;
        if let Some(p3) = self.p3 {
            write!(f, "{p3:02X}")?;
        }
        if let Some(data) = &self.data {
            f.write_str(&hex::encode_upper(data))?;
        }
        Ok(())
    }
}

/// Split a raw command buffer into its fields
pub fn split_command(raw: &[u8]) -> Result<Command> {
    Command::from_bytes(raw)
}
