//! Wire-layer error types

use thiserror::Error;

/// Errors from constructing or decoding CDC-ACM records
///
/// These are reported before any transfer is attempted: a line coding
/// with an out-of-domain stop-bits or parity value never reaches the
/// device.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Stop-bits value outside the CDC 1.1 domain {0, 1, 2}
    #[error("invalid stop bits value: {0}")]
    InvalidStopBits(u8),

    /// Parity value outside the CDC 1.1 domain {0..=4}
    #[error("invalid parity value: {0}")]
    InvalidParity(u8),

    /// Data-bits count the abstract control model cannot carry
    #[error("invalid data bits count: {0}")]
    InvalidDataBits(u8),
}

/// Type alias for wire-layer results
pub type Result<T> = std::result::Result<T, ProtocolError>;
