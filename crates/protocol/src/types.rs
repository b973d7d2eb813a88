//! CDC-ACM request codes and record definitions
//!
//! Request codes come from USB CDC 1.1 section 6.2. Only the SET_*
//! requests are issued by the host core; GET_LINE_CODING and SEND_BREAK
//! are carried for completeness.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ProtocolError, Result};

/// SET_LINE_CODING class request
pub const SET_LINE_CODING: u8 = 0x20;
/// GET_LINE_CODING class request (unused by the host core)
pub const GET_LINE_CODING: u8 = 0x21;
/// SET_CONTROL_LINE_STATE class request
pub const SET_CONTROL_LINE_STATE: u8 = 0x22;
/// SEND_BREAK class request (unused by the host core)
pub const SEND_BREAK: u8 = 0x23;

/// bmRequestType for ACM class requests: class-specific, interface recipient,
/// host-to-device
pub const ACM_CONTROL_REQUEST_TYPE: u8 = 0x21;

/// Length of the serialized line-coding payload
pub const LINE_CODING_LEN: usize = 7;

/// Stop-bits field of the line coding record
///
/// Wire values per CDC 1.1 table 50.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopBits {
    /// 1 stop bit
    One = 0,
    /// 1.5 stop bits
    OnePointFive = 1,
    /// 2 stop bits
    Two = 2,
}

impl TryFrom<u8> for StopBits {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(StopBits::One),
            1 => Ok(StopBits::OnePointFive),
            2 => Ok(StopBits::Two),
            other => Err(ProtocolError::InvalidStopBits(other)),
        }
    }
}

/// Parity field of the line coding record
///
/// Wire values per CDC 1.1 table 50.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Parity {
    /// No parity bit
    None = 0,
    /// Odd parity
    Odd = 1,
    /// Even parity
    Even = 2,
    /// Parity bit always 1
    Mark = 3,
    /// Parity bit always 0
    Space = 4,
}

impl TryFrom<u8> for Parity {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            3 => Ok(Parity::Mark),
            4 => Ok(Parity::Space),
            other => Err(ProtocolError::InvalidParity(other)),
        }
    }
}

/// Line coding record sent with SET_LINE_CODING
///
/// Serializes to a fixed 7-byte payload:
/// [baud rate, 4 bytes little-endian][stop bits][parity][data bits].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCoding {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Data bits per character (5, 6, 7, 8 or 16)
    pub data_bits: u8,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Parity
    pub parity: Parity,
}

impl LineCoding {
    /// Create a line coding record from already-typed fields
    pub fn new(baud_rate: u32, data_bits: u8, stop_bits: StopBits, parity: Parity) -> Self {
        Self {
            baud_rate,
            data_bits,
            stop_bits,
            parity,
        }
    }

    /// Create a line coding record from raw wire values
    ///
    /// Rejects stop-bits, parity and data-bits values outside their
    /// enumerated domains. This is the validation gate for callers
    /// holding untyped configuration.
    pub fn from_raw(baud_rate: u32, data_bits: u8, stop_bits: u8, parity: u8) -> Result<Self> {
        if !matches!(data_bits, 5 | 6 | 7 | 8 | 16) {
            return Err(ProtocolError::InvalidDataBits(data_bits));
        }
        Ok(Self {
            baud_rate,
            data_bits,
            stop_bits: StopBits::try_from(stop_bits)?,
            parity: Parity::try_from(parity)?,
        })
    }

    /// Serialize to the 7-byte SET_LINE_CODING payload
    pub fn encode(&self) -> [u8; LINE_CODING_LEN] {
        let mut payload = [0u8; LINE_CODING_LEN];
        LittleEndian::write_u32(&mut payload[0..4], self.baud_rate);
        payload[4] = self.stop_bits as u8;
        payload[5] = self.parity as u8;
        payload[6] = self.data_bits;
        payload
    }
}

/// Control line state sent with SET_CONTROL_LINE_STATE
///
/// Both flags are packed into one wValue so the device never observes
/// an inconsistent pair mid-update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlLineState {
    /// Data Terminal Ready
    pub dtr: bool,
    /// Request To Send
    pub rts: bool,
}

impl ControlLineState {
    /// Pack into the wire value: (RTS << 1) | DTR
    pub fn wire_value(&self) -> u16 {
        (u16::from(self.rts) << 1) | u16::from(self.dtr)
    }
}
