//! USB transport core
//!
//! The transport side of the crate:
//! - the [`UsbConnection`] capability trait and its rusb backend
//! - the CDC-ACM [`SerialPort`] (interface claiming, line coding,
//!   DTR/RTS, bulk read/write)
//! - the background [`SerialIoManager`] servicing one port
//!
//! Blocking transfers happen only on the I/O manager's thread; the
//! application stays decoupled from transport latency.

pub mod connection;
pub mod io_manager;
pub mod port;
pub mod rusb_backend;

pub use connection::{Direction, EndpointDescriptor, TransferKind, UsbConnection};
pub use io_manager::{BUFFER_CAPACITY, READ_WAIT, RunState, SerialIoManager, SerialListener};
pub use port::{AcmSerialPort, SCRATCH_CAPACITY, SerialPort};
pub use rusb_backend::RusbConnection;
