//! CDC-ACM serial port
//!
//! Owns one claimed control/data interface pair and exposes byte-level
//! and control-level primitives: line coding, DTR/RTS, and blocking
//! bulk read/write. All methods take `&self`; the port is shared via
//! `Arc` between the application and the I/O manager.

use std::sync::{Mutex, RwLock};
use std::time::Duration;

use protocol::{
    ACM_CONTROL_REQUEST_TYPE, ControlLineState, LineCoding, SET_CONTROL_LINE_STATE,
    SET_LINE_CODING,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::usb::connection::{EndpointDescriptor, UsbConnection};

/// Interface index of the CDC control (communications) interface
const CONTROL_INTERFACE: u8 = 0;
/// Interface index of the CDC data interface
const DATA_INTERFACE: u8 = 1;

/// Timeout for class-specific control transfers
const CONTROL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Capacity of the read scratch buffer and the write chunk size
pub const SCRATCH_CAPACITY: usize = 4096;

/// Attempts a write chunk gets before the loop reports a short write
const MAX_STALLED_ATTEMPTS: u32 = 3;

/// Session-level serial port contract
///
/// One CDC-ACM implementation is provided; the capability set stays
/// swappable for future transport variants.
pub trait SerialPort: Send + Sync {
    /// The transport connection this port binds at open time
    type Connection: UsbConnection;

    /// Claim interfaces and resolve endpoints
    fn open(&self, connection: Self::Connection) -> Result<()>;

    /// Release the connection and clear resolved endpoints
    fn close(&self) -> Result<()>;

    /// Apply a line coding to the device
    fn set_parameters(&self, coding: LineCoding) -> Result<()>;

    /// Read up to `dest.len()` bytes; a bounded timeout with no data
    /// yields `Ok(0)`
    fn read(&self, dest: &mut [u8], timeout: Option<Duration>) -> Result<usize>;

    /// Write all of `src`, chunked at the scratch capacity
    fn write(&self, src: &[u8], timeout: Option<Duration>) -> Result<usize>;

    /// Set Data Terminal Ready; both control lines are sent jointly
    fn set_dtr(&self, value: bool) -> Result<()>;

    /// Set Request To Send; both control lines are sent jointly
    fn set_rts(&self, value: bool) -> Result<()>;

    /// Last DTR value set (no device round-trip)
    fn dtr(&self) -> bool;

    /// Last RTS value set (no device round-trip)
    fn rts(&self) -> bool;
}

/// One open session: the connection plus endpoints resolved at open
struct Session<C> {
    connection: C,
    /// First endpoint of the control interface (interrupt
    /// notifications, unused for data transfer)
    control_endpoint: EndpointDescriptor,
    /// Bulk IN endpoint address of the data interface
    read_endpoint: u8,
    /// Bulk OUT endpoint address of the data interface
    write_endpoint: u8,
}

/// CDC-ACM implementation of [`SerialPort`]
pub struct AcmSerialPort<C: UsbConnection> {
    /// Written only by open/close; transfers take the shared side
    session: RwLock<Option<Session<C>>>,
    /// Read scratch, one reader at a time
    read_scratch: Mutex<Box<[u8]>>,
    /// Serializes chunked writes on the OUT endpoint
    write_gate: Mutex<()>,
    line_state: Mutex<ControlLineState>,
}

impl<C: UsbConnection> AcmSerialPort<C> {
    /// Create a port with no connection bound
    pub fn new() -> Self {
        Self {
            session: RwLock::new(None),
            read_scratch: Mutex::new(vec![0u8; SCRATCH_CAPACITY].into_boxed_slice()),
            write_gate: Mutex::new(()),
            line_state: Mutex::new(ControlLineState::default()),
        }
    }

    /// Whether a connection is currently bound
    pub fn is_open(&self) -> bool {
        self.session.read().unwrap().is_some()
    }

    /// Notification endpoint of the control interface, if open
    ///
    /// Resolved at open time; carries CDC notifications and is unused
    /// for data transfer.
    pub fn control_endpoint(&self) -> Option<EndpointDescriptor> {
        self.session
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.control_endpoint)
    }

    fn send_acm_control(&self, session: &Session<C>, request: u8, value: u16, data: &[u8]) -> Result<()> {
        session
            .connection
            .control_out(
                ACM_CONTROL_REQUEST_TYPE,
                request,
                value,
                0,
                data,
                CONTROL_TIMEOUT,
            )
            .map(|_| ())
    }
}

impl<C: UsbConnection> Default for AcmSerialPort<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: UsbConnection> SerialPort for AcmSerialPort<C> {
    type Connection = C;

    fn open(&self, connection: C) -> Result<()> {
        let mut slot = self.session.write().unwrap();
        if slot.is_some() {
            return Err(Error::AlreadyOpen);
        }

        // Claim both interfaces and resolve endpoints before anything
        // is stored: an error here leaves the port observably closed.
        match resolve_session(connection) {
            Ok(session) => {
                *slot = Some(session);
                Ok(())
            }
            Err((mut connection, e)) => {
                connection.close();
                Err(e)
            }
        }
    }

    fn close(&self) -> Result<()> {
        let mut slot = self.session.write().unwrap();
        let mut session = slot.take().ok_or(Error::AlreadyClosed)?;
        session.connection.close();
        debug!("port closed");
        Ok(())
    }

    fn set_parameters(&self, coding: LineCoding) -> Result<()> {
        let session = self.session.read().unwrap();
        let session = session.as_ref().ok_or(Error::NotOpen)?;

        let payload = coding.encode();
        debug!(
            baud = coding.baud_rate,
            data_bits = coding.data_bits,
            "setting line coding"
        );
        self.send_acm_control(session, SET_LINE_CODING, 0, &payload)
    }

    fn read(&self, dest: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        let session = self.session.read().unwrap();
        let session = session.as_ref().ok_or(Error::NotOpen)?;

        let mut scratch = self.read_scratch.lock().unwrap();
        let limit = dest.len().min(scratch.len());

        match session
            .connection
            .bulk_read(session.read_endpoint, &mut scratch[..limit], timeout)
        {
            Ok(received) => {
                dest[..received].copy_from_slice(&scratch[..received]);
                Ok(received)
            }
            Err(Error::TransferTimeout) => {
                if timeout.is_none() {
                    // An unbounded wait that still reports a timeout
                    // points at a lower-level fault.
                    Err(Error::TransferFault {
                        message: "unbounded read reported a timeout".to_string(),
                    })
                } else {
                    Ok(0)
                }
            }
            Err(e) => Err(e),
        }
    }

    fn write(&self, src: &[u8], timeout: Option<Duration>) -> Result<usize> {
        let session = self.session.read().unwrap();
        let session = session.as_ref().ok_or(Error::NotOpen)?;

        let mut offset = 0;
        let mut stalled = 0u32;

        while offset < src.len() {
            let chunk_len = (src.len() - offset).min(SCRATCH_CAPACITY);
            let chunk = &src[offset..offset + chunk_len];

            let written = {
                let _gate = self.write_gate.lock().unwrap();
                match session
                    .connection
                    .bulk_write(session.write_endpoint, chunk, timeout)
                {
                    Ok(n) => n,
                    Err(Error::TransferTimeout) => 0,
                    Err(e) => return Err(e),
                }
            };

            if written == 0 {
                stalled += 1;
                warn!(
                    offset,
                    attempted = chunk_len,
                    attempt = stalled,
                    "bulk write made no progress"
                );
                if stalled >= MAX_STALLED_ATTEMPTS {
                    return Err(Error::ShortWrite {
                        written: offset,
                        requested: src.len(),
                    });
                }
                continue;
            }

            debug!(wrote = written, attempted = chunk_len, "bulk write");
            offset += written;
            stalled = 0;
        }
        Ok(offset)
    }

    fn set_dtr(&self, value: bool) -> Result<()> {
        let session = self.session.read().unwrap();
        let session = session.as_ref().ok_or(Error::NotOpen)?;

        // Held across the transfer so concurrent toggles cannot send a
        // stale pair out of order.
        let mut state = self.line_state.lock().unwrap();
        state.dtr = value;
        self.send_acm_control(session, SET_CONTROL_LINE_STATE, state.wire_value(), &[])
    }

    fn set_rts(&self, value: bool) -> Result<()> {
        let session = self.session.read().unwrap();
        let session = session.as_ref().ok_or(Error::NotOpen)?;

        let mut state = self.line_state.lock().unwrap();
        state.rts = value;
        self.send_acm_control(session, SET_CONTROL_LINE_STATE, state.wire_value(), &[])
    }

    fn dtr(&self) -> bool {
        self.line_state.lock().unwrap().dtr
    }

    fn rts(&self) -> bool {
        self.line_state.lock().unwrap().rts
    }
}

/// Claim the control and data interfaces and resolve endpoints
///
/// Returns the connection alongside the error on failure so the caller
/// can release whatever was partially claimed.
fn resolve_session<C: UsbConnection>(connection: C) -> std::result::Result<Session<C>, (C, Error)> {
    if let Err(e) = connection.claim_interface(CONTROL_INTERFACE, true) {
        warn!("could not claim control interface: {}", e);
        return Err((
            connection,
            Error::InterfaceClaimFailed {
                interface: CONTROL_INTERFACE,
            },
        ));
    }

    let control_endpoint = match connection
        .interface_endpoints(CONTROL_INTERFACE)
        .map(|endpoints| endpoints.first().copied())
    {
        Ok(Some(endpoint)) => endpoint,
        Ok(None) => {
            return Err((
                connection,
                Error::TransferFault {
                    message: "control interface declares no endpoints".to_string(),
                },
            ));
        }
        Err(e) => return Err((connection, e)),
    };
    debug!(?control_endpoint, "resolved control endpoint");

    if let Err(e) = connection.claim_interface(DATA_INTERFACE, true) {
        warn!("could not claim data interface: {}", e);
        return Err((
            connection,
            Error::InterfaceClaimFailed {
                interface: DATA_INTERFACE,
            },
        ));
    }

    let endpoints = match connection.interface_endpoints(DATA_INTERFACE) {
        Ok(endpoints) => endpoints,
        Err(e) => return Err((connection, e)),
    };

    let read_endpoint = endpoints.iter().find(|e| e.is_bulk_in());
    let write_endpoint = endpoints.iter().find(|e| e.is_bulk_out());
    let (read_endpoint, write_endpoint) = match (read_endpoint, write_endpoint) {
        (Some(read), Some(write)) => (read.address, write.address),
        _ => {
            return Err((
                connection,
                Error::TransferFault {
                    message: "data interface lacks a bulk IN/OUT endpoint pair".to_string(),
                },
            ));
        }
    };
    debug!(
        read = format_args!("{:#04x}", read_endpoint),
        write = format_args!("{:#04x}", write_endpoint),
        "resolved data endpoints"
    );

    Ok(Session {
        connection,
        control_endpoint,
        read_endpoint,
        write_endpoint,
    })
}
