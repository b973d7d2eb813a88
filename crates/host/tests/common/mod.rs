//! Scripted transport connection for driving the port without hardware

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use host::usb::{Direction, EndpointDescriptor, TransferKind, UsbConnection};
use host::{Error, Result};

/// One scripted outcome for a bulk IN transfer
pub enum ReadStep {
    Data(Vec<u8>),
    Timeout,
    Fault,
}

/// One scripted outcome for a bulk OUT transfer
pub enum WriteStep {
    /// Accept the whole chunk
    Accept,
    /// Confirm only this many bytes
    Partial(usize),
    /// Report zero progress
    Stall,
    /// Report a timeout
    Timeout,
    /// Report a transport fault
    Fault,
}

/// A recorded control transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRecord {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: Vec<u8>,
}

/// Shared recording state, kept by the test across the move into the port
pub struct MockState {
    /// Interfaces whose claim is refused
    pub refuse_interfaces: Mutex<Vec<u8>>,
    /// Endpoints declared by interface 0 (control)
    pub control_endpoints: Mutex<Vec<EndpointDescriptor>>,
    /// Endpoints declared by interface 1 (data)
    pub data_endpoints: Mutex<Vec<EndpointDescriptor>>,
    /// (interface, force) claims in order
    pub claims: Mutex<Vec<(u8, bool)>>,
    pub releases: Mutex<Vec<u8>>,
    pub controls: Mutex<Vec<ControlRecord>>,
    /// (endpoint, bytes) bulk writes in order
    pub writes: Mutex<Vec<(u8, Vec<u8>)>>,
    /// Endpoints passed to bulk reads in order
    pub reads: Mutex<Vec<u8>>,
    pub read_script: Mutex<VecDeque<ReadStep>>,
    pub write_script: Mutex<VecDeque<WriteStep>>,
    pub closed: Mutex<bool>,
}

/// Test double for [`UsbConnection`]
#[derive(Clone)]
pub struct MockConnection {
    pub state: Arc<MockState>,
}

impl MockConnection {
    /// A connection shaped like a CDC-ACM device: interrupt notification
    /// endpoint on interface 0, bulk OUT then bulk IN on interface 1.
    pub fn new() -> Self {
        let state = Arc::new(MockState {
            refuse_interfaces: Mutex::new(Vec::new()),
            control_endpoints: Mutex::new(vec![EndpointDescriptor {
                address: 0x83,
                direction: Direction::In,
                transfer_type: TransferKind::Interrupt,
            }]),
            data_endpoints: Mutex::new(vec![
                // OUT declared first so resolution has to scan by
                // direction rather than position.
                EndpointDescriptor {
                    address: 0x02,
                    direction: Direction::Out,
                    transfer_type: TransferKind::Bulk,
                },
                EndpointDescriptor {
                    address: 0x81,
                    direction: Direction::In,
                    transfer_type: TransferKind::Bulk,
                },
            ]),
            claims: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            read_script: Mutex::new(VecDeque::new()),
            write_script: Mutex::new(VecDeque::new()),
            closed: Mutex::new(false),
        });
        Self { state }
    }

    pub fn refuse_interface(&self, number: u8) {
        self.state.refuse_interfaces.lock().unwrap().push(number);
    }

    pub fn script_read(&self, step: ReadStep) {
        self.state.read_script.lock().unwrap().push_back(step);
    }

    pub fn script_write(&self, step: WriteStep) {
        self.state.write_script.lock().unwrap().push_back(step);
    }
}

impl UsbConnection for MockConnection {
    fn claim_interface(&self, number: u8, force: bool) -> Result<()> {
        self.state.claims.lock().unwrap().push((number, force));
        if self.state.refuse_interfaces.lock().unwrap().contains(&number) {
            return Err(Error::TransferFault {
                message: format!("interface {} is busy", number),
            });
        }
        Ok(())
    }

    fn release_interface(&self, number: u8) -> Result<()> {
        self.state.releases.lock().unwrap().push(number);
        Ok(())
    }

    fn interface_endpoints(&self, number: u8) -> Result<Vec<EndpointDescriptor>> {
        match number {
            0 => Ok(self.state.control_endpoints.lock().unwrap().clone()),
            1 => Ok(self.state.data_endpoints.lock().unwrap().clone()),
            other => Err(Error::TransferFault {
                message: format!("no interface {}", other),
            }),
        }
    }

    fn control_out(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize> {
        self.state.controls.lock().unwrap().push(ControlRecord {
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
        });
        Ok(data.len())
    }

    fn bulk_read(&self, endpoint: u8, buf: &mut [u8], _timeout: Option<Duration>) -> Result<usize> {
        self.state.reads.lock().unwrap().push(endpoint);
        match self.state.read_script.lock().unwrap().pop_front() {
            Some(ReadStep::Data(data)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            Some(ReadStep::Timeout) | None => Err(Error::TransferTimeout),
            Some(ReadStep::Fault) => Err(Error::TransferFault {
                message: "scripted fault".to_string(),
            }),
        }
    }

    fn bulk_write(&self, endpoint: u8, buf: &[u8], _timeout: Option<Duration>) -> Result<usize> {
        let step = self.state.write_script.lock().unwrap().pop_front();
        match step {
            Some(WriteStep::Accept) | None => {
                self.state
                    .writes
                    .lock()
                    .unwrap()
                    .push((endpoint, buf.to_vec()));
                Ok(buf.len())
            }
            Some(WriteStep::Partial(n)) => {
                self.state
                    .writes
                    .lock()
                    .unwrap()
                    .push((endpoint, buf[..n].to_vec()));
                Ok(n)
            }
            Some(WriteStep::Stall) => Ok(0),
            Some(WriteStep::Timeout) => Err(Error::TransferTimeout),
            Some(WriteStep::Fault) => Err(Error::TransferFault {
                message: "scripted fault".to_string(),
            }),
        }
    }

    fn close(&mut self) {
        *self.state.closed.lock().unwrap() = true;
    }
}
