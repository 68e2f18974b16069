//! ISO 7816-4 channel management on top of a [`CardLink`]

use bytes::{Bytes, BytesMut};
use tracing::{debug, instrument, trace, warn};
use uicc_apdu_core::{
    Command, FileCommand, FileInstruction, MAX_CHANNEL, clear_channel_number,
    decode_channel_number,
};
use uicc_terminal::{ChannelProvider, OpenResponse, ProviderError, ProviderHandle};

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::link::{CardLink, PcscConnection};
use crate::status::{StatusWord, split_response};

const INS_MANAGE_CHANNEL: u8 = 0x70;
const INS_SELECT: u8 = 0xA4;
const INS_GET_RESPONSE: u8 = 0xC0;
const INS_READ_BINARY: u8 = 0xB0;
const INS_READ_RECORD: u8 = 0xB2;

/// MANAGE CHANNEL P1 for closing a channel
const MANAGE_CHANNEL_CLOSE: u8 = 0x80;
/// SELECT P1: by path from the MF
const SELECT_BY_PATH: u8 = 0x08;
/// SELECT P1: by DF name
const SELECT_BY_NAME: u8 = 0x04;
/// SELECT P2: return the FCP template
const SELECT_RETURN_FCP: u8 = 0x04;

/// Identifier of the master file, implied by SELECT by path
const MF: [u8; 2] = [0x3F, 0x00];

/// Low bits of a provider handle holding the ISO channel number
const HANDLE_CHANNEL_BITS: u32 = 8;

/// [`ChannelProvider`] managing logical channels with MANAGE CHANNEL and SELECT
///
/// A provider handle carries the ISO channel number assigned by the card in
/// its low byte and the link's reset generation above it. Handles opened
/// before a card reset are refused, so a channel number the card hands out
/// again after the reset never reaches a stale client.
#[derive(Debug)]
pub struct PcscChannelProvider<L = PcscConnection> {
    link: L,
    config: PcscConfig,
}

impl<L: CardLink> PcscChannelProvider<L> {
    /// Create a provider over `link`
    pub const fn new(link: L, config: PcscConfig) -> Self {
        Self { link, config }
    }

    /// Get a reference to the underlying link
    pub const fn link(&self) -> &L {
        &self.link
    }

    /// Get a mutable reference to the underlying link
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Get the configuration
    pub const fn config(&self) -> &PcscConfig {
        &self.config
    }

    /// Transmit `command`, following `61xx` with GET RESPONSE and `6Cxx` with a resend
    ///
    /// Returns the response data of all rounds followed by the last status word.
    pub fn exchange(&mut self, command: &Command) -> Result<Bytes, PcscError> {
        let mut response = self.link.transmit_raw(&command.to_bytes())?;
        let mut data = BytesMut::new();
        let mut rounds = 0;

        loop {
            let (body, sw) = split_response(&response)?;
            if rounds >= self.config.max_get_response {
                break;
            }

            let next = if let Some(available) = sw.bytes_available() {
                data.extend_from_slice(body);
                // GET RESPONSE goes out in the class and on the channel the command used
                Command::new(clear_channel_number(command.cla), INS_GET_RESPONSE, 0x00, 0x00)
                    .on_channel(decode_channel_number(command.cla))?
                    .with_p3(available)
            } else if let Some(length) = sw.corrected_length() {
                let mut resend = command.clone();
                resend.p3 = Some(length);
                resend
            } else {
                break;
            };

            trace!(%sw, rounds, "Fetching remaining response");
            rounds += 1;
            response = self.link.transmit_raw(&next.to_bytes())?;
        }

        data.extend_from_slice(&response);
        Ok(data.freeze())
    }

    /// Exchange `command` and require a successful status word
    fn exchange_checked(&mut self, command: &Command) -> Result<Bytes, PcscError> {
        let response = self.exchange(command)?;
        let (_, sw) = split_response(&response)?;
        if sw.is_success() || sw.is_warning() {
            Ok(response)
        } else {
            Err(PcscError::Status(sw))
        }
    }

    fn manage_channel_open(&mut self) -> Result<u8, PcscError> {
        let command = Command::new(0x00, INS_MANAGE_CHANNEL, 0x00, 0x00).with_p3(0x01);
        let response = self.exchange(&command)?;

        match split_response(&response)? {
            ([channel], sw) if sw.is_success() => {
                if (1..=MAX_CHANNEL).contains(channel) {
                    Ok(*channel)
                } else {
                    Err(PcscError::InvalidHandle(u32::from(*channel)))
                }
            }
            (_, sw) if sw.is_success() => Err(PcscError::ShortResponse(response.len())),
            (_, sw) => Err(PcscError::Status(sw)),
        }
    }

    fn manage_channel_close(&mut self, channel: u8) -> Result<(), PcscError> {
        let command = Command::new(0x00, INS_MANAGE_CHANNEL, MANAGE_CHANNEL_CLOSE, channel)
            .on_channel(channel)?;
        let response = self.exchange(&command)?;
        let (_, sw) = split_response(&response)?;
        if sw.is_success() {
            Ok(())
        } else {
            Err(PcscError::Status(sw))
        }
    }

    /// SELECT by DF name on `channel`; an empty AID selects the default applet
    fn select_by_name(&mut self, channel: u8, aid: &[u8]) -> Result<Bytes, PcscError> {
        let select = Command::new(0x00, INS_SELECT, SELECT_BY_NAME, 0x00);
        let command = if aid.is_empty() {
            // Le only
            select.with_p3(0x00)
        } else {
            let lc = u8::try_from(aid.len()).map_err(|_| PcscError::AidTooLong(aid.len()))?;
            let mut data = BytesMut::with_capacity(aid.len() + 1);
            data.extend_from_slice(aid);
            // Le
            data.extend_from_slice(&[0x00]);
            Command {
                p3: Some(lc),
                data: Some(data.freeze()),
                ..select
            }
        }
        .on_channel(channel)?;
        self.exchange_checked(&command)
    }

    fn select_by_path(&mut self, file_id: u16, path: &str) -> Result<Bytes, PcscError> {
        let mut data = BytesMut::from(decode_path(path)?.as_slice());
        data.extend_from_slice(&file_id.to_be_bytes());

        let command = Command::new(self.config.file_class, INS_SELECT, SELECT_BY_PATH, SELECT_RETURN_FCP)
            .with_data(data.freeze());
        self.exchange_checked(&command)
    }

    /// Handle for a channel the card just opened
    fn handle(&self, channel: u8) -> ProviderHandle {
        handle_for(channel, self.link.reset_generation())
    }

    /// ISO channel of `handle`, provided the card was not reset since it was opened
    fn live_channel(&self, handle: ProviderHandle) -> Result<u8, PcscError> {
        let channel = channel_of(handle)?;
        if handle == self.handle(channel) {
            Ok(channel)
        } else {
            Err(PcscError::ChannelReset(channel))
        }
    }
}

/// Decode a hex path of file identifiers, dropping a leading MF
fn decode_path(path: &str) -> Result<Vec<u8>, PcscError> {
    let bytes = hex::decode(path).map_err(|_| PcscError::InvalidPath(path.to_string()))?;
    if bytes.len() % 2 != 0 {
        return Err(PcscError::InvalidPath(path.to_string()));
    }

    Ok(match bytes.strip_prefix(&MF) {
        Some(rest) => rest.to_vec(),
        None => bytes,
    })
}

/// Handle for `channel` opened in reset `generation`
const fn handle_for(channel: u8, generation: u32) -> ProviderHandle {
    ProviderHandle((generation << HANDLE_CHANNEL_BITS) | channel as u32)
}

/// ISO channel in the low byte of a handle
fn channel_of(handle: ProviderHandle) -> Result<u8, PcscError> {
    u8::try_from(handle.0 & 0xFF)
        .ok()
        .filter(|channel| (1..=MAX_CHANNEL).contains(channel))
        .ok_or(PcscError::InvalidHandle(handle.0))
}

impl<L: CardLink> ChannelProvider for PcscChannelProvider<L> {
    #[instrument(level = "debug", skip(self, aid), fields(aid = %hex::encode_upper(aid)))]
    fn open(&mut self, aid: &[u8]) -> OpenResponse {
        if aid.len() > usize::from(u8::MAX) {
            return OpenResponse::Failed(PcscError::AidTooLong(aid.len()).to_string());
        }

        let channel = match self.manage_channel_open() {
            Ok(channel) => channel,
            Err(PcscError::Status(sw)) if sw.is_missing_channel() => {
                debug!(%sw, "Card has no logical channel available");
                return OpenResponse::MissingResource;
            }
            Err(err) => {
                warn!(error = %err, "MANAGE CHANNEL failed");
                return OpenResponse::Failed(err.to_string());
            }
        };
        debug!(channel, "Channel opened on card");

        match self.select_by_name(channel, aid) {
            Ok(select_response) => OpenResponse::Opened {
                handle: self.handle(channel),
                select_response,
            },
            Err(err) => {
                if let Err(close_err) = self.manage_channel_close(channel) {
                    warn!(channel, error = %close_err, "Closing channel after failed SELECT failed");
                }
                match err.status() {
                    Some(StatusWord::NOT_FOUND) => OpenResponse::NoSuchElement,
                    _ => OpenResponse::Failed(err.to_string()),
                }
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    fn close(&mut self, handle: ProviderHandle) -> bool {
        let result = self
            .live_channel(handle)
            .and_then(|channel| self.manage_channel_close(channel));
        match result {
            Ok(()) => true,
            Err(PcscError::ChannelReset(channel)) => {
                debug!(channel, "Channel already closed by card reset");
                true
            }
            Err(err) => {
                warn!(error = %err, "MANAGE CHANNEL close failed");
                false
            }
        }
    }

    fn transmit_basic(&mut self, command: &Command) -> Result<Bytes, ProviderError> {
        Ok(self.exchange(command)?)
    }

    fn transmit_logical(
        &mut self,
        handle: ProviderHandle,
        command: &Command,
    ) -> Result<Bytes, ProviderError> {
        let channel = self.live_channel(handle)?;
        let command = command.on_channel(channel).map_err(PcscError::from)?;
        Ok(self.exchange(&command)?)
    }

    #[instrument(level = "debug", skip(self, command), fields(instruction = %command.instruction))]
    fn exchange_file(
        &mut self,
        file_id: u16,
        command: &FileCommand,
        path: &str,
    ) -> Result<Bytes, ProviderError> {
        let fcp = self.select_by_path(file_id, path)?;

        let ins = match command.instruction {
            FileInstruction::Select => return Ok(fcp),
            FileInstruction::ReadBinary => INS_READ_BINARY,
            FileInstruction::ReadRecord => INS_READ_RECORD,
        };
        let read = Command::new(self.config.file_class, ins, command.p1, command.p2).with_p3(command.p3);
        Ok(self.exchange(&read)?)
    }

    fn card_present(&self) -> bool {
        self.link.is_present()
    }

    fn atr(&mut self) -> Option<Bytes> {
        match self.link.atr() {
            Ok(atr) => Some(atr),
            Err(err) => {
                debug!(error = %err, "ATR unavailable");
                None
            }
        }
    }
}
