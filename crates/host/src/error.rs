//! Host transport error types
//!
//! One taxonomy covers the serial port and the I/O manager. Session-state
//! and argument errors are returned synchronously; transfer faults raised
//! inside the I/O manager loop surface once through the listener.

use thiserror::Error;

/// Errors raised by the serial port and I/O manager
#[derive(Debug, Error)]
pub enum Error {
    /// `open` called while a connection is already bound
    #[error("port is already open")]
    AlreadyOpen,

    /// `close` called with no connection bound
    #[error("port is already closed")]
    AlreadyClosed,

    /// A transfer was attempted on a port that was never opened
    #[error("port is not open")]
    NotOpen,

    /// The host stack refused exclusive access to an interface
    #[error("could not claim interface {interface}")]
    InterfaceClaimFailed {
        /// Interface number that was refused
        interface: u8,
    },

    /// A parameter fell outside its enumerated domain
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] protocol::ProtocolError),

    /// A bounded wait elapsed with no progress
    #[error("transfer timed out")]
    TransferTimeout,

    /// The transport reported an error distinct from a timeout
    #[error("transfer fault: {message}")]
    TransferFault {
        /// Description from the host stack
        message: String,
    },

    /// The write loop could not place all bytes within its retry bound
    #[error("short write: {written} of {requested} bytes")]
    ShortWrite {
        /// Bytes confirmed written before progress stopped
        written: usize,
        /// Bytes the caller asked to write
        requested: usize,
    },

    /// An enqueue would exceed the write buffer capacity
    #[error("write buffer overflow: {pending} pending + {requested} requested exceeds {capacity}")]
    OutOfBuffer {
        /// Bytes already enqueued and not yet drained
        pending: usize,
        /// Bytes the caller tried to enqueue
        requested: usize,
        /// Fixed buffer capacity
        capacity: usize,
    },

    /// `start` called on a manager that is not stopped
    #[error("I/O manager is already running")]
    AlreadyRunning,

    /// The device disappeared or was never present
    #[error("device not found")]
    DeviceNotFound,

    /// The host stack denied access to the device node
    #[error("permission denied")]
    PermissionDenied,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside the USB stack (thread spawn, stdio)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for host transport results
pub type Result<T> = std::result::Result<T, Error>;
