//! acm-console
//!
//! Minimal console for one CDC-ACM serial device: finds the device by
//! vendor/product id, opens it at 8N1, and bridges stdin/stdout to the
//! serial byte stream through the background I/O manager.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use host::usb::{AcmSerialPort, RusbConnection, SerialIoManager, SerialListener};
use host::{Error, SerialPort, setup_logging};
use protocol::{LineCoding, Parity, StopBits};
use rusb::UsbContext;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "acm-console")]
#[command(
    author,
    version,
    about = "Console for a USB CDC-ACM serial device",
    long_about = "
Bridges stdin/stdout to a CDC-ACM (virtual serial) USB device.

EXAMPLES:
    # Talk to an Arduino Uno (default ids 2341:0042)
    acm-console

    # Other device and baud rate
    acm-console --vid 16c0 --pid 0483 --baud 9600

Lines read from stdin are written to the device; device output is
copied to stdout. End stdin (Ctrl-D) to stop.
"
)]
struct Args {
    /// Vendor id, hex
    #[arg(long, default_value = "2341", value_parser = parse_hex_u16)]
    vid: u16,

    /// Product id, hex
    #[arg(long, default_value = "0042", value_parser = parse_hex_u16)]
    pid: u16,

    /// Baud rate
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_hex_u16(value: &str) -> Result<u16, String> {
    u16::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| format!("not a hex id: {}", e))
}

/// Copies incoming serial bytes to stdout
struct ConsoleListener;

impl SerialListener for ConsoleListener {
    fn on_new_data(&self, data: Vec<u8>) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(&data);
        let _ = stdout.flush();
    }

    fn on_run_error(&self, error: Error) {
        error!("serial session ended: {}", error);
    }
}

/// Scan the bus for the first device matching the id pair
fn find_device(context: &rusb::Context, vid: u16, pid: u16) -> Result<rusb::Device<rusb::Context>> {
    for device in context.devices()?.iter() {
        let descriptor = device.device_descriptor()?;
        debug!(
            "device found: {:04x}:{:04x}",
            descriptor.vendor_id(),
            descriptor.product_id()
        );
        if descriptor.vendor_id() == vid && descriptor.product_id() == pid {
            info!("matched device at bus {}", device.bus_number());
            return Ok(device);
        }
    }
    anyhow::bail!("no device with id {:04x}:{:04x} attached", vid, pid)
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level)?;

    let context = rusb::Context::new().context("failed to initialize USB context")?;
    let device = find_device(&context, args.vid, args.pid)?;

    let connection = RusbConnection::open(device).with_context(|| {
        format!(
            "failed to open device {:04x}:{:04x} (check udev permissions)",
            args.vid, args.pid
        )
    })?;

    let port = Arc::new(AcmSerialPort::new());
    port.open(connection)?;
    port.set_parameters(LineCoding::new(args.baud, 8, StopBits::One, Parity::None))?;
    port.set_dtr(true)?;
    port.set_rts(true)?;
    info!(baud = args.baud, "port configured");

    let manager = SerialIoManager::new(Arc::clone(&port), Some(Arc::new(ConsoleListener)));
    let worker = manager.start()?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        manager.write_async(line.as_bytes())?;
        manager.write_async(b"\n")?;
    }

    manager.stop();
    if worker.join().is_err() {
        error!("serial I/O thread panicked");
    }
    port.close()?;
    Ok(())
}
