//! CDC-ACM wire layer for acm-serial
//!
//! This crate defines the USB CDC 1.1 Abstract Control Model requests and
//! records exchanged with a virtual-serial device: the class-specific
//! request codes, the 7-byte line-coding payload, and the packed
//! control-line-state value. It performs no USB I/O; the `host` crate
//! issues the transfers.
//!
//! # Example
//!
//! ```
//! use protocol::{LineCoding, Parity, StopBits};
//!
//! let coding = LineCoding::new(115_200, 8, StopBits::One, Parity::None);
//! assert_eq!(coding.encode(), [0x00, 0xC2, 0x01, 0x00, 0x00, 0x00, 0x08]);
//! ```

pub mod error;
pub mod types;

pub use error::{ProtocolError, Result};
pub use types::{
    ACM_CONTROL_REQUEST_TYPE, ControlLineState, GET_LINE_CODING, LINE_CODING_LEN, LineCoding,
    Parity, SEND_BREAK, SET_CONTROL_LINE_STATE, SET_LINE_CODING, StopBits,
};
