//! Host transport for USB CDC-ACM serial devices
//!
//! Connects an application to a virtual-serial USB device (an
//! Arduino-class microcontroller) and exchanges raw byte streams with
//! it. The crate provides:
//!
//! - [`AcmSerialPort`](usb::AcmSerialPort): claims the CDC control and
//!   data interfaces, configures line coding and DTR/RTS, and moves
//!   bytes over the bulk endpoints.
//! - [`SerialIoManager`](usb::SerialIoManager): a background thread
//!   that drains buffered writes and polls for incoming data, pushing
//!   it to a listener so the application never blocks on the transport.
//!
//! Device discovery and the user-facing console live in the
//! `acm-console` binary; the library only requires an already-opened
//! connection.

pub mod error;
pub mod logging;
pub mod usb;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use usb::{
    AcmSerialPort, RunState, RusbConnection, SerialIoManager, SerialListener, SerialPort,
    UsbConnection,
};
