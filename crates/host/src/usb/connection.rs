//! Transport connection capability
//!
//! The serial port and I/O manager only ever see this trait: an
//! already-opened USB device that can claim interfaces, perform control
//! and bulk transfers with timeouts, and be closed. The `rusb` backend
//! implements it against real hardware; tests script it.

use std::time::Duration;

use crate::error::Result;

/// Transfer direction of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

/// Transfer type of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// Endpoint descriptor resolved from a claimed interface
///
/// Resolved once at open time; immutable for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Endpoint address including the direction bit (e.g. 0x81)
    pub address: u8,
    /// Transfer direction
    pub direction: Direction,
    /// Transfer type
    pub transfer_type: TransferKind,
}

impl EndpointDescriptor {
    /// Whether this is a bulk IN (read) endpoint
    pub fn is_bulk_in(&self) -> bool {
        self.transfer_type == TransferKind::Bulk && self.direction == Direction::In
    }

    /// Whether this is a bulk OUT (write) endpoint
    pub fn is_bulk_out(&self) -> bool {
        self.transfer_type == TransferKind::Bulk && self.direction == Direction::Out
    }
}

/// An opened USB device connection
///
/// Timeouts are `Option<Duration>`: `None` requests an unbounded wait.
/// Implementations report a bounded wait that elapsed with no progress as
/// [`Error::TransferTimeout`](crate::Error::TransferTimeout) so callers can
/// tell it apart from a genuine fault.
pub trait UsbConnection: Send + Sync {
    /// Claim exclusive access to an interface
    ///
    /// With `force`, an active kernel driver is detached first.
    fn claim_interface(&self, number: u8, force: bool) -> Result<()>;

    /// Release a previously claimed interface
    fn release_interface(&self, number: u8) -> Result<()>;

    /// Endpoint descriptors declared by an interface
    fn interface_endpoints(&self, number: u8) -> Result<Vec<EndpointDescriptor>>;

    /// Issue a host-to-device control transfer
    ///
    /// Returns the number of bytes transferred.
    fn control_out(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize>;

    /// Bulk transfer from an IN endpoint into `buf`
    fn bulk_read(&self, endpoint: u8, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize>;

    /// Bulk transfer of `buf` to an OUT endpoint
    fn bulk_write(&self, endpoint: u8, buf: &[u8], timeout: Option<Duration>) -> Result<usize>;

    /// Release claimed interfaces and close the connection
    fn close(&mut self);
}
