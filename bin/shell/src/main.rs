//! Interactive shell for a UICC terminal on a PC/SC reader
//!
//! Several logical channels can be opened side by side and addressed by the
//! channel number in the class byte of each command, as a multiplexed card
//! client would.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, select};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uicc_terminal::{
    ChannelProvider, EventReceiver, TerminalConfig, TerminalEvent, UiccTerminal, event_channel,
};
use uicc_transport_pcsc::{
    CardEvent, PcscChannelProvider, PcscConfig, PcscDeviceManager, PcscReader, card_event_channel,
};

mod commands;
mod display;

use commands::{ShellCommand, execute};

#[derive(Parser)]
#[command(version, about = "Interactive shell multiplexing logical channels on a UICC")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    /// Class byte for legacy SIM file access (hex)
    #[arg(long, default_value = "00", value_parser = parse_class)]
    file_class: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Show the Answer To Reset of the card
    Atr,

    /// Start an interactive session
    Shell,
}

fn parse_class(value: &str) -> Result<u8, String> {
    u8::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|err| err.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let manager = PcscDeviceManager::new()?;

    if let Commands::List = cli.command {
        return list_readers(&manager);
    }

    let reader = match &cli.reader {
        Some(reader_name) => find_reader_by_name(&manager, reader_name)?,
        None => manager.first_reader_with_card()?,
    };
    info!("Using reader: {}", reader.name());

    let config = PcscConfig::default().with_file_class(cli.file_class);
    let mut provider = manager.open_provider_with_config(reader.name(), config)?;

    match cli.command {
        Commands::List => Ok(()),
        Commands::Atr => {
            match provider.atr() {
                Some(atr) => println!("{}", hex::encode_upper(&atr)),
                None => println!("{}", display::warning("ATR not available")),
            }
            Ok(())
        }
        Commands::Shell => run_shell(&manager, &reader, provider),
    }
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(true)
        .init();
}

fn list_readers(manager: &PcscDeviceManager) -> Result<(), Box<dyn std::error::Error>> {
    let readers = manager.list_readers()?;

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = if reader.has_card() {
            "card present"
        } else {
            "no card"
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}

fn find_reader_by_name(
    manager: &PcscDeviceManager,
    reader_name: &str,
) -> Result<PcscReader, Box<dyn std::error::Error>> {
    manager
        .list_readers()?
        .into_iter()
        .find(|r| r.name() == reader_name)
        .ok_or_else(|| format!("Reader '{reader_name}' not found").into())
}

fn run_shell(
    manager: &PcscDeviceManager,
    reader: &PcscReader,
    provider: PcscChannelProvider,
) -> Result<(), Box<dyn std::error::Error>> {
    let (event_sender, event_receiver) = event_channel();
    let terminal = Arc::new(
        UiccTerminal::new(provider, TerminalConfig::default()).with_event_sender(event_sender),
    );

    let (card_sender, card_receiver) = card_event_channel();
    let mut monitor = manager.monitor(reader.name())?;
    monitor.start(card_sender)?;

    let watcher = {
        let terminal = Arc::clone(&terminal);
        thread::spawn(move || watch_events(&terminal, &card_receiver, &event_receiver))
    };

    println!("{}", commands::HELP);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "{}", display::prompt())?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.parse::<ShellCommand>() {
            Ok(ShellCommand::Exit) => break,
            Ok(command) => execute(&terminal, &command, &mut stdout)?,
            Err(err) => writeln!(stdout, "{}", display::error(&err.to_string()))?,
        }
    }

    // The watcher exits once the monitor drops its sender
    monitor.stop();
    if watcher.join().is_err() {
        debug!("Event watcher panicked");
    }

    Ok(())
}

/// Feed card insertions into the refresh hook and print terminal events
fn watch_events<P: ChannelProvider>(
    terminal: &UiccTerminal<P>,
    cards: &Receiver<CardEvent>,
    events: &EventReceiver,
) {
    loop {
        select! {
            recv(cards) -> event => match event {
                Ok(CardEvent::Inserted { reader, atr }) => {
                    debug!(%reader, atr = %hex::encode_upper(&atr), "Card inserted");
                    terminal.on_card_state_refreshed();
                }
                Ok(CardEvent::Removed { reader }) => {
                    println!("{}", display::notice(&format!("Card removed from {reader}")));
                }
                Err(_) => break,
            },
            recv(events) -> event => match event {
                Ok(TerminalEvent::StateChanged { action }) => {
                    println!("{}", display::notice(&format!("State changed: {action}")));
                }
                Err(_) => break,
            },
        }
    }
}
