//! Shell command parsing and execution

use std::io::{self, Write};
use std::str::FromStr;

use uicc_terminal::{ChannelProvider, ErrorCarrier, UiccTerminal, carry};

use crate::display;

pub(crate) const HELP: &str = "\
Commands:
  open <aid> [p2]             open a logical channel to an applet
  close <channel>             close a logical channel
  send <hex>                  transmit a command, channel taken from CLA
  simio <fid> <path|-> <hex>  legacy SIM file access, '-' keeps the last path
  present                     check card presence
  atr                         show the Answer To Reset
  channels                    list open logical channels
  help                        show this help
  exit                        leave the shell";

/// A parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    Open { aid: Vec<u8>, p2: u8 },
    Close(usize),
    Send(Vec<u8>),
    SimIo {
        file_id: u16,
        path: String,
        command: Vec<u8>,
    },
    Present,
    Atr,
    Channels,
    Help,
    Exit,
}

/// Why a shell line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ParseError {
    #[error("Unknown command {0:?}, try 'help'")]
    Unknown(String),

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("Unexpected argument {0:?}")]
    Unexpected(String),
}

/// Hex bytes spread over the remaining words
fn hex_words<'a>(name: &'static str, words: impl Iterator<Item = &'a str>) -> Result<Vec<u8>, ParseError> {
    let joined: String = words.collect();
    if joined.is_empty() {
        return Err(ParseError::Missing(name));
    }
    hex::decode(&joined).map_err(|_| ParseError::Invalid(name, joined))
}

fn hex_number<T: TryFrom<u32>>(name: &'static str, word: Option<&str>) -> Result<T, ParseError> {
    let word = word.ok_or(ParseError::Missing(name))?;
    let digits = word.trim_start_matches("0x");
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| ParseError::Invalid(name, word.to_string()))
}

impl FromStr for ShellCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(ParseError::Missing("command"))?;

        let command = match name.to_ascii_lowercase().as_str() {
            "open" => {
                let word = words.next().ok_or(ParseError::Missing("AID"))?;
                let aid =
                    hex::decode(word).map_err(|_| ParseError::Invalid("AID", word.to_string()))?;
                let p2 = match words.next() {
                    Some(word) => hex_number("P2", Some(word))?,
                    None => 0x00,
                };
                Self::Open { aid, p2 }
            }
            "close" => {
                let word = words.next().ok_or(ParseError::Missing("channel"))?;
                let index = word
                    .parse()
                    .map_err(|_| ParseError::Invalid("channel", word.to_string()))?;
                Self::Close(index)
            }
            "send" => return Ok(Self::Send(hex_words("command", words)?)),
            "simio" => {
                let file_id = hex_number("file id", words.next())?;
                let path = match words.next().ok_or(ParseError::Missing("path"))? {
                    "-" => String::new(),
                    path => path.to_string(),
                };
                let command = hex_words("command", words)?;
                return Ok(Self::SimIo {
                    file_id,
                    path,
                    command,
                });
            }
            "present" => Self::Present,
            "atr" => Self::Atr,
            "channels" => Self::Channels,
            "help" | "?" => Self::Help,
            "exit" | "quit" => Self::Exit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };

        match words.next() {
            Some(extra) => Err(ParseError::Unexpected(extra.to_string())),
            None => Ok(command),
        }
    }
}

fn report(out: &mut impl Write, error: &ErrorCarrier) -> io::Result<()> {
    writeln!(out, "{}", display::error(&format!("{:?}: {}", error.kind, error.message)))
}

/// Run `command` against `terminal`, printing the outcome to `out`
pub(crate) fn execute<P: ChannelProvider>(
    terminal: &UiccTerminal<P>,
    command: &ShellCommand,
    out: &mut impl Write,
) -> io::Result<()> {
    match command {
        ShellCommand::Open { aid, p2 } => match carry(terminal.open_logical_channel(aid, *p2)) {
            Ok(Some(opened)) => writeln!(
                out,
                "{}",
                display::success(&format!(
                    "Channel {} opened, select response {}",
                    opened.channel_index,
                    hex::encode_upper(&opened.select_response)
                ))
            ),
            Ok(None) => writeln!(out, "{}", display::warning("Logical channels are not available")),
            Err(err) => report(out, &err),
        },
        ShellCommand::Close(index) => match carry(terminal.close_logical_channel(*index)) {
            Ok(()) => writeln!(out, "{}", display::success(&format!("Channel {index} closed"))),
            Err(err) => report(out, &err),
        },
        ShellCommand::Send(raw) => match carry(terminal.transmit(raw)) {
            Ok(response) => writeln!(out, "{}", hex::encode_upper(&response)),
            Err(err) => report(out, &err),
        },
        ShellCommand::SimIo {
            file_id,
            path,
            command,
        } => match carry(terminal.exchange_legacy_file(*file_id, path, command)) {
            Ok(response) => writeln!(out, "{}", hex::encode_upper(&response)),
            Err(err) => report(out, &err),
        },
        ShellCommand::Present => {
            let status = if terminal.is_card_present() {
                "card present"
            } else {
                "no card"
            };
            writeln!(out, "{status}")
        }
        ShellCommand::Atr => match terminal.atr() {
            Some(atr) => writeln!(out, "{}", hex::encode_upper(&atr)),
            None => writeln!(out, "{}", display::warning("ATR not available")),
        },
        ShellCommand::Channels => {
            let channels = terminal.open_channels();
            if channels.is_empty() {
                return writeln!(out, "No logical channels open");
            }
            for (index, handle) in channels {
                writeln!(out, "{index}: handle {handle}")?;
            }
            Ok(())
        }
        ShellCommand::Help => writeln!(out, "{HELP}"),
        ShellCommand::Exit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use uicc_terminal::mock::MockProvider;
    use uicc_terminal::{OpenResponse, TerminalConfig};

    fn run(terminal: &UiccTerminal<MockProvider>, line: &str) -> String {
        let command: ShellCommand = line.parse().unwrap();
        let mut out = Vec::new();
        execute(terminal, &command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "open A000000003000000".parse(),
            Ok(ShellCommand::Open {
                aid: hex!("A000000003000000").to_vec(),
                p2: 0x00
            })
        );
        assert_eq!(
            "open a0000000 0x04".parse(),
            Ok(ShellCommand::Open {
                aid: hex!("A0000000").to_vec(),
                p2: 0x04
            })
        );
        assert_eq!("close 2".parse(), Ok(ShellCommand::Close(2)));
        assert_eq!(
            "send 00A40400 02 3F00".parse(),
            Ok(ShellCommand::Send(hex!("00A40400023F00").to_vec()))
        );
        assert_eq!(
            "simio 6F07 - 00B0000009".parse(),
            Ok(ShellCommand::SimIo {
                file_id: 0x6F07,
                path: String::new(),
                command: hex!("00B0000009").to_vec(),
            })
        );
        assert_eq!("EXIT".parse(), Ok(ShellCommand::Exit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "select".parse::<ShellCommand>(),
            Err(ParseError::Unknown("select".into()))
        );
        assert_eq!("send".parse::<ShellCommand>(), Err(ParseError::Missing("command")));
        assert_eq!(
            "open A0000G 01".parse::<ShellCommand>(),
            Err(ParseError::Invalid("AID", "A0000G".into()))
        );
        assert_eq!(
            "close one".parse::<ShellCommand>(),
            Err(ParseError::Invalid("channel", "one".into()))
        );
        assert_eq!(
            "simio 16F07 3F00 00B0000009".parse::<ShellCommand>(),
            Err(ParseError::Invalid("file id", "16F07".into()))
        );
        assert_eq!(
            "present now".parse::<ShellCommand>(),
            Err(ParseError::Unexpected("now".into()))
        );
    }

    #[test]
    fn test_session() {
        let terminal = UiccTerminal::new(
            MockProvider::new().with_default_response(hex!("6F009000").to_vec()),
            TerminalConfig::default(),
        );

        assert!(run(&terminal, "open A000000003000000").contains("Channel 1 opened"));
        assert_eq!(run(&terminal, "channels"), "1: handle 1\n");
        assert_eq!(run(&terminal, "send 01CA9F7F00"), "6F009000\n");
        assert!(run(&terminal, "close 1").contains("Channel 1 closed"));
        assert_eq!(run(&terminal, "channels"), "No logical channels open\n");
        assert!(run(&terminal, "send 01CA9F7F00").contains("ChannelNotOpen"));
        assert_eq!(run(&terminal, "present"), "card present\n");
        assert!(run(&terminal, "atr").contains("ATR not available"));
    }

    #[test]
    fn test_session_errors() {
        let terminal = UiccTerminal::new(
            MockProvider::new()
                .with_open_response(OpenResponse::MissingResource)
                .with_open_response(OpenResponse::NoSuchElement),
            TerminalConfig::default(),
        );

        assert!(run(&terminal, "open A0000000").contains("Logical channels are not available"));
        assert!(run(&terminal, "open A0000000").contains("AppletNotFound"));
        assert!(run(&terminal, "simio 6F07 3F00 00D6000001").contains("UnsupportedInstruction"));
    }
}
