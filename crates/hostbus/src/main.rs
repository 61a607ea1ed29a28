//! ch34x-bridge
//!
//! Small CLI for probing and exercising an attached CH341 serial
//! adapter through the driver core.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use driver::{
    ChipVariant, DeviceRegistry, LifecycleEvent, LineControl, PortSettings, SerialDevice,
};
use hostbus::{list_adapters, setup_logging, UsbHostBus};
use std::sync::mpsc;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ch34x-bridge")]
#[command(author, version, about = "Bridge a CH340/CH341 USB adapter to a serial port")]
struct Args {
    /// Path to the port settings file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attached CH341 adapters
    List,
    /// Attach the adapter and run configuration and bring-up
    Probe,
    /// Attach, bring up and program a line configuration
    SetLine {
        /// Baud rate
        #[arg(default_value_t = 115_200)]
        baud: u32,
        /// Stop-bits code
        #[arg(long, default_value_t = 0)]
        stop_bits: u8,
        /// Parity code
        #[arg(long, default_value_t = 0)]
        parity: u8,
        /// Data-bits code
        #[arg(long, default_value_t = 0)]
        data_bits: u8,
    },
    /// Attach, bring up and run a write-then-read exercise
    Loopback {
        /// Payload to send
        #[arg(default_value = "ch34x-bridge loopback")]
        payload: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level)?;

    let settings = match args.config {
        Some(path) => PortSettings::load(Some(path)).context("loading port settings")?,
        None => PortSettings::load_or_default(),
    };

    match args.command {
        Command::List => list(),
        Command::Probe => {
            let device = attach(&settings)?;
            println!("{} started", device.name());
            Ok(())
        }
        Command::SetLine {
            baud,
            stop_bits,
            parity,
            data_bits,
        } => {
            let device = attach(&settings)?;
            device
                .set_line_coding(
                    baud,
                    LineControl {
                        stop_bits,
                        parity,
                        word_length: data_bits,
                    },
                )
                .context("programming the line")?;
            println!("{}: line set to {baud} baud", device.name());
            Ok(())
        }
        Command::Loopback { payload } => {
            let device = attach(&settings)?;
            loopback(&device, payload.into_bytes())
        }
    }
}

fn list() -> Result<()> {
    let adapters = list_adapters()?;
    if adapters.is_empty() {
        println!("no CH341 adapters attached");
        return Ok(());
    }
    for (bus, address) in adapters {
        println!("bus {bus:03} device {address:03}");
    }
    Ok(())
}

/// Open the adapter and drive it through the start event.
fn attach(settings: &PortSettings) -> Result<Arc<SerialDevice>> {
    let bus = Arc::new(UsbHostBus::open()?);
    let registry = DeviceRegistry::new();
    let variant = settings.chip_variant();
    let alias = if settings.skip_external_naming {
        None
    } else {
        settings.port_name.as_deref()
    };
    let device = registry.attach_device(bus, variant, alias);
    if variant == ChipVariant::Legacy {
        info!("treating adapter as pre-HX silicon");
    }
    device
        .handle_event(LifecycleEvent::Start)
        .context("starting the adapter")?;
    Ok(device)
}

fn loopback(device: &SerialDevice, payload: Vec<u8>) -> Result<()> {
    let sent = payload.len();
    let (tx, rx) = mpsc::channel();
    device.write(
        payload,
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    )?;
    let outcome = rx.recv().context("write never completed")?;
    outcome.status?;
    println!("sent {} bytes", outcome.bytes_transferred);

    let (tx, rx) = mpsc::channel();
    device.read(
        sent,
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    )?;
    let outcome = rx.recv().context("read never completed")?;
    outcome.status?;
    println!(
        "received {} bytes: {}",
        outcome.bytes_transferred,
        String::from_utf8_lossy(&outcome.data)
    );
    Ok(())
}
