//! Legacy SIM file I/O

use bytes::Bytes;
use tracing::{instrument, trace, warn};
use uicc_apdu_core::FileCommand;

use crate::Result;
use crate::provider::ChannelProvider;

/// Translates legacy file access commands and remembers the selected path
///
/// Clients only send a path when it changes; requests with an empty path
/// reuse the last one seen.
#[derive(Debug, Clone, Default)]
pub struct FileIoAdapter {
    current_path: String,
}

impl FileIoAdapter {
    /// Create an adapter with no file selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Path forwarded with the next request that carries none
    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Translate `command` and exchange it against `file_id` through `provider`
    ///
    /// The stored path is only updated once the command has been translated.
    #[instrument(level = "debug", skip(self, provider, command))]
    pub fn exchange<P: ChannelProvider>(
        &mut self,
        provider: &mut P,
        file_id: u16,
        path: &str,
        command: &[u8],
    ) -> Result<Bytes> {
        let file_command = FileCommand::from_legacy(command)?;

        if !path.is_empty() {
            self.current_path = path.to_string();
        }

        trace!(
            instruction = %file_command.instruction,
            path = %self.current_path,
            "Exchanging file command"
        );
        provider
            .exchange_file(file_id, &file_command, &self.current_path)
            .map_err(|err| {
                warn!(file_id, error = %err, "File exchange failed");
                err.into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::mock::{MockProvider, ProviderCall};
    use hex_literal::hex;
    use uicc_apdu_core::FileInstruction;

    fn last_exchange(calls: &crate::mock::CallLog) -> (u16, FileCommand, String) {
        match calls.lock().last() {
            Some(ProviderCall::ExchangeFile {
                file_id,
                command,
                path,
            }) => (*file_id, *command, path.clone()),
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_select_is_translated() {
        let mut provider = MockProvider::new().with_response(hex!("621A9000").to_vec());
        let calls = provider.call_log();
        let mut adapter = FileIoAdapter::new();

        let response = adapter
            .exchange(&mut provider, 0x6F07, "3F007FFF", &hex!("00A4000402"))
            .unwrap();
        assert_eq!(response.as_ref(), &hex!("621A9000"));

        let (file_id, command, path) = last_exchange(&calls);
        assert_eq!(file_id, 0x6F07);
        assert_eq!(command.instruction, FileInstruction::Select);
        assert_eq!((command.p1, command.p2, command.p3), (0, 0, 15));
        assert_eq!(path, "3F007FFF");
    }

    #[test]
    fn test_empty_path_reuses_previous() {
        let mut provider = MockProvider::new();
        let calls = provider.call_log();
        let mut adapter = FileIoAdapter::new();

        adapter
            .exchange(&mut provider, 0x6F07, "3F007F20", &hex!("00B000000A"))
            .unwrap();
        adapter
            .exchange(&mut provider, 0x6F3A, "", &hex!("00B2010420"))
            .unwrap();

        let (file_id, command, path) = last_exchange(&calls);
        assert_eq!(file_id, 0x6F3A);
        assert_eq!(command.instruction.code(), 178);
        assert_eq!((command.p1, command.p2, command.p3), (1, 4, 0x20));
        assert_eq!(path, "3F007F20");
        assert_eq!(adapter.current_path(), "3F007F20");
    }

    #[test]
    fn test_unsupported_instruction_keeps_path() {
        let mut provider = MockProvider::new();
        let calls = provider.call_log();
        let mut adapter = FileIoAdapter::new();
        adapter
            .exchange(&mut provider, 0x2FE2, "3F00", &hex!("00B000000A"))
            .unwrap();

        let err = adapter
            .exchange(&mut provider, 0x6F07, "3F007FFF", &hex!("00D6000001"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedInstruction);
        assert_eq!(adapter.current_path(), "3F00");
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_provider_failure() {
        let mut provider = MockProvider::new().with_failure("SIM busy");
        let mut adapter = FileIoAdapter::new();

        let err = adapter
            .exchange(&mut provider, 0x6F07, "3F00", &hex!("00B0000009"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransmitFailed);
        // The path was valid, so it is remembered
        assert_eq!(adapter.current_path(), "3F00");
    }
}
