//! rusb-backed transport connection
//!
//! Wraps an opened `rusb::DeviceHandle` as a [`UsbConnection`], mapping
//! rusb errors into the host taxonomy. Open-time failures distinguish
//! "not found", "permission denied" and "claim failed" so the consumer
//! can render distinct guidance.

use std::sync::Mutex;
use std::time::Duration;

use rusb::{Context, Device, DeviceHandle};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::usb::connection::{Direction, EndpointDescriptor, TransferKind, UsbConnection};

/// libusb convention: a zero timeout waits indefinitely
const UNBOUNDED: Duration = Duration::ZERO;

/// A claimed USB device served by rusb
pub struct RusbConnection {
    device: Device<Context>,
    handle: DeviceHandle<Context>,
    /// Interfaces claimed through this connection, released on close
    claimed: Mutex<Vec<u8>>,
}

impl RusbConnection {
    /// Open a device for transfers
    ///
    /// Maps `NoDevice`/`NotFound` to [`Error::DeviceNotFound`] and
    /// `Access` to [`Error::PermissionDenied`].
    pub fn open(device: Device<Context>) -> Result<Self> {
        let handle = device.open().map_err(|e| {
            warn!("failed to open device: {}", e);
            map_open_error(e)
        })?;

        debug!(
            bus = device.bus_number(),
            address = device.address(),
            "opened device"
        );

        Ok(Self {
            device,
            handle,
            claimed: Mutex::new(Vec::new()),
        })
    }
}

impl UsbConnection for RusbConnection {
    fn claim_interface(&self, number: u8, force: bool) -> Result<()> {
        if force {
            match self.handle.kernel_driver_active(number) {
                Ok(true) => {
                    debug!(interface = number, "detaching kernel driver");
                    if let Err(e) = self.handle.detach_kernel_driver(number) {
                        warn!(interface = number, "failed to detach kernel driver: {}", e);
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(
                        interface = number,
                        "could not check kernel driver status: {}", e
                    );
                }
            }
        }

        self.handle.claim_interface(number).map_err(map_rusb_error)?;
        debug!(interface = number, "claimed interface");
        self.claimed.lock().unwrap().push(number);
        Ok(())
    }

    fn release_interface(&self, number: u8) -> Result<()> {
        self.handle
            .release_interface(number)
            .map_err(map_rusb_error)?;
        self.claimed.lock().unwrap().retain(|n| *n != number);
        debug!(interface = number, "released interface");
        Ok(())
    }

    fn interface_endpoints(&self, number: u8) -> Result<Vec<EndpointDescriptor>> {
        let config = self
            .device
            .active_config_descriptor()
            .map_err(map_rusb_error)?;

        let interface = config
            .interfaces()
            .find(|i| i.number() == number)
            .ok_or_else(|| Error::TransferFault {
                message: format!("interface {} not present in active configuration", number),
            })?;

        let mut endpoints = Vec::new();
        for descriptor in interface.descriptors() {
            for endpoint in descriptor.endpoint_descriptors() {
                endpoints.push(EndpointDescriptor {
                    address: endpoint.address(),
                    direction: map_direction(endpoint.direction()),
                    transfer_type: map_transfer_type(endpoint.transfer_type()),
                });
            }
        }
        Ok(endpoints)
    }

    fn control_out(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize> {
        debug!(
            request_type = format_args!("{:#04x}", request_type),
            request = format_args!("{:#04x}", request),
            value,
            index,
            len = data.len(),
            "control transfer"
        );
        self.handle
            .write_control(request_type, request, value, index, data, timeout)
            .map_err(map_rusb_error)
    }

    fn bulk_read(&self, endpoint: u8, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        self.handle
            .read_bulk(endpoint, buf, timeout.unwrap_or(UNBOUNDED))
            .map_err(map_rusb_error)
    }

    fn bulk_write(&self, endpoint: u8, buf: &[u8], timeout: Option<Duration>) -> Result<usize> {
        self.handle
            .write_bulk(endpoint, buf, timeout.unwrap_or(UNBOUNDED))
            .map_err(map_rusb_error)
    }

    fn close(&mut self) {
        let claimed = std::mem::take(&mut *self.claimed.lock().unwrap());
        for interface in claimed {
            if let Err(e) = self.handle.release_interface(interface) {
                warn!(interface, "failed to release interface: {}", e);
            }
            // Restore the device to kernel control where a driver had
            // been detached.
            if let Err(e) = self.handle.attach_kernel_driver(interface) {
                debug!(
                    interface,
                    "could not reattach kernel driver (may not have been detached): {}", e
                );
            }
        }
        debug!("closed connection");
    }
}

/// Map an open-time rusb error to the host taxonomy
fn map_open_error(err: rusb::Error) -> Error {
    match err {
        rusb::Error::NoDevice | rusb::Error::NotFound => Error::DeviceNotFound,
        rusb::Error::Access => Error::PermissionDenied,
        other => map_rusb_error(other),
    }
}

/// Map a transfer-time rusb error to the host taxonomy
///
/// Timeouts stay distinct from faults; the port layer decides whether a
/// timeout is an empty poll or a genuine error.
fn map_rusb_error(err: rusb::Error) -> Error {
    match err {
        rusb::Error::Timeout => Error::TransferTimeout,
        rusb::Error::NoDevice => Error::DeviceNotFound,
        rusb::Error::Access => Error::PermissionDenied,
        other => Error::TransferFault {
            message: other.to_string(),
        },
    }
}

fn map_direction(direction: rusb::Direction) -> Direction {
    match direction {
        rusb::Direction::In => Direction::In,
        rusb::Direction::Out => Direction::Out,
    }
}

fn map_transfer_type(transfer_type: rusb::TransferType) -> TransferKind {
    match transfer_type {
        rusb::TransferType::Control => TransferKind::Control,
        rusb::TransferType::Isochronous => TransferKind::Isochronous,
        rusb::TransferType::Bulk => TransferKind::Bulk,
        rusb::TransferType::Interrupt => TransferKind::Interrupt,
    }
}
