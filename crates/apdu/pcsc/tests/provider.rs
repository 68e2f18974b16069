//! Tests against a real reader
//!
//! Every test returns early when PC/SC, a reader or a card is unavailable.

use uicc_terminal::{ChannelProvider, TerminalConfig, UiccTerminal};
use uicc_transport_pcsc::{PcscDeviceManager, PcscError, card_event_channel};

fn manager() -> Option<PcscDeviceManager> {
    match PcscDeviceManager::new() {
        Ok(manager) => Some(manager),
        Err(err) => {
            println!("Skipping test, PC/SC not available: {err}");
            None
        }
    }
}

#[test]
fn test_list_readers() {
    let Some(manager) = manager() else {
        return;
    };

    match manager.list_readers() {
        Ok(readers) => {
            assert!(!readers.is_empty(), "Expected at least one reader");
            for reader in &readers {
                assert_eq!(reader.has_card(), reader.atr().is_some());
            }
        }
        Err(PcscError::NoReadersAvailable) => println!("Skipping test, no readers"),
        Err(err) => println!("Could not list readers: {err}"),
    }
}

#[test]
fn test_unknown_reader() {
    let Some(manager) = manager() else {
        return;
    };
    if manager.list_readers().is_err() {
        println!("Skipping test, no readers");
        return;
    }

    let err = manager.open_provider("No Such Reader 00 00").unwrap_err();
    assert!(matches!(err, PcscError::ReaderNotFound(_)));
}

#[test]
fn test_basic_channel_with_card() {
    let Some(manager) = manager() else {
        return;
    };
    let Ok(reader) = manager.first_reader_with_card() else {
        println!("Skipping test, no card available");
        return;
    };

    let mut provider = manager.open_provider(reader.name()).unwrap();
    assert!(provider.card_present());
    assert!(provider.atr().is_some_and(|atr| !atr.is_empty()));

    let terminal = UiccTerminal::new(provider, TerminalConfig::default());
    // SELECT MF, any status word will do
    match terminal.transmit(&[0x00, 0xA4, 0x00, 0x00, 0x02, 0x3F, 0x00]) {
        Ok(response) => assert!(response.len() >= 2, "Response too short"),
        Err(err) => println!("Transmit failed (might be expected): {err}"),
    }
}

#[test]
fn test_monitor_reports_present_card() {
    let Some(manager) = manager() else {
        return;
    };
    let Ok(reader) = manager.first_reader_with_card() else {
        println!("Skipping test, no card available");
        return;
    };

    let (sender, receiver) = card_event_channel();
    let mut monitor = manager.monitor(reader.name()).unwrap();
    monitor.start(sender).unwrap();

    let event = receiver.recv_timeout(std::time::Duration::from_secs(5));
    monitor.stop();
    assert!(matches!(
        event,
        Ok(uicc_transport_pcsc::CardEvent::Inserted { .. })
    ));
}
