//! Legacy SIM file I/O translation
//!
//! Clients written against card-reader APIs address elementary files with
//! plain `READ BINARY`, `READ RECORD` and `SELECT` APDUs. Modem-style file
//! exchange primitives instead take a numeric command code plus P1/P2/P3 and
//! the path of the selected file. This module maps the former onto the latter.

use std::fmt;

use tracing::trace;

use crate::{Error, Result};

/// Length of a legacy file access command (`CLA INS P1 P2 P3`)
pub const LEGACY_COMMAND_LEN: usize = 5;

/// Command codes understood by the file exchange primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileInstruction {
    /// READ BINARY
    ReadBinary = 176,
    /// READ RECORD
    ReadRecord = 178,
    /// SELECT, answered with the file control parameters of the selected file
    Select = 192,
}

impl FileInstruction {
    /// Numeric command code
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FileInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadBinary => "READ BINARY",
            Self::ReadRecord => "READ RECORD",
            Self::Select => "SELECT",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// Translation of one legacy instruction byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyInstruction {
    /// Canonical command code
    pub instruction: FileInstruction,
    /// Parameters replacing the client's P1, P2 and P3, if the instruction forces them
    pub forced: Option<(u8, u8, u8)>,
}

/// Translate a legacy instruction byte
///
/// | INS  | code | P1/P2/P3   |
/// |------|------|------------|
/// | 0xB0 | 176  | unchanged  |
/// | 0xB2 | 178  | unchanged  |
/// | 0xA4 | 192  | 0 / 0 / 15 |
pub const fn decode_legacy_instruction(ins: u8) -> Result<LegacyInstruction> {
    match ins {
        0xB0 => Ok(LegacyInstruction {
            instruction: FileInstruction::ReadBinary,
            forced: None,
        }),
        0xB2 => Ok(LegacyInstruction {
            instruction: FileInstruction::ReadRecord,
            forced: None,
        }),
        0xA4 => Ok(LegacyInstruction {
            instruction: FileInstruction::Select,
            forced: Some((0, 0, 15)),
        }),
        other => Err(Error::UnsupportedInstruction(other)),
    }
}

/// A legacy command translated for the file exchange primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCommand {
    /// Canonical command code
    pub instruction: FileInstruction,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Parameter 3
    pub p3: u8,
}

impl FileCommand {
    /// Translate a raw `CLA INS P1 P2 P3` legacy command
    pub fn from_legacy(raw: &[u8]) -> Result<Self> {
        if raw.len() < LEGACY_COMMAND_LEN {
            return Err(Error::MalformedCommand {
                expected: LEGACY_COMMAND_LEN,
                actual: raw.len(),
            });
        }

        let legacy = decode_legacy_instruction(raw[1])?;
        let (p1, p2, p3) = legacy.forced.unwrap_or((raw[2], raw[3], raw[4]));
        trace!(ins = raw[1], instruction = %legacy.instruction, p1, p2, p3, "Translated legacy file command");

        Ok(Self {
            instruction: legacy.instruction,
            p1,
            p2,
            p3,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_read_commands_keep_parameters() {
        let read_binary = FileCommand::from_legacy(&hex!("00B0010210")).unwrap();
        assert_eq!(read_binary.instruction.code(), 176);
        assert_eq!((read_binary.p1, read_binary.p2, read_binary.p3), (1, 2, 0x10));

        let read_record = FileCommand::from_legacy(&hex!("A0B2030420")).unwrap();
        assert_eq!(read_record.instruction, FileInstruction::ReadRecord);
        assert_eq!((read_record.p1, read_record.p2, read_record.p3), (3, 4, 0x20));
    }

    #[test]
    fn test_select_forces_parameters() {
        for raw in [hex!("00A4000002"), hex!("00A40804FF"), hex!("A0A4FFFF00")] {
            let select = FileCommand::from_legacy(&raw).unwrap();
            assert_eq!(select.instruction.code(), 192);
            assert_eq!((select.p1, select.p2, select.p3), (0, 0, 15));
        }
    }

    #[test]
    fn test_unsupported_instructions() {
        for ins in (0..=u8::MAX).filter(|ins| ![0xB0, 0xB2, 0xA4].contains(ins)) {
            assert_eq!(
                decode_legacy_instruction(ins),
                Err(Error::UnsupportedInstruction(ins))
            );
        }
    }

    #[test]
    fn test_legacy_command_too_short() {
        assert_eq!(
            FileCommand::from_legacy(&hex!("00B00000")),
            Err(Error::MalformedCommand {
                expected: 5,
                actual: 4
            })
        );
    }
}
