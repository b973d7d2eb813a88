//! Background serial I/O manager
//!
//! A dedicated OS thread continuously services one serial port: each
//! iteration drains the shared write buffer to the port, then polls the
//! port for incoming bytes and hands them to the registered listener.
//! The application never blocks on transport latency; it only enqueues
//! via [`SerialIoManager::write_async`] and consumes listener callbacks.
//!
//! A manager runs until stopped or until a transport fault ends the
//! loop. After either exit it is Stopped and should be discarded; a new
//! session wants a fresh instance.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::usb::port::SerialPort;

/// Timeout for the per-iteration drain write and poll read
///
/// Short enough that a stop request is observed promptly.
pub const READ_WAIT: Duration = Duration::from_millis(200);

/// Capacity of the write buffer and the poll read buffer
pub const BUFFER_CAPACITY: usize = 4096;

/// Consumer of I/O manager events
///
/// Both callbacks run on the manager's own thread; long blocking work
/// here stalls subsequent poll cycles.
pub trait SerialListener: Send + Sync {
    /// New incoming data; the listener owns the bytes from here on
    fn on_new_data(&self, data: Vec<u8>);

    /// The service loop aborted on a transport error (reported once)
    fn on_run_error(&self, error: Error);
}

/// Manager run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Stopping,
}

struct Shared {
    state: Mutex<RunState>,
    /// Pending outgoing bytes; never grows past [`BUFFER_CAPACITY`]
    write_buffer: Mutex<Vec<u8>>,
    listener: Mutex<Option<Arc<dyn SerialListener>>>,
}

impl Shared {
    fn run_state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    fn listener(&self) -> Option<Arc<dyn SerialListener>> {
        self.listener.lock().unwrap().clone()
    }
}

/// Services one serial port from a background thread
pub struct SerialIoManager<P: SerialPort> {
    port: Arc<P>,
    shared: Arc<Shared>,
}

impl<P: SerialPort + 'static> SerialIoManager<P> {
    /// Create a manager bound to an opened port
    pub fn new(port: Arc<P>, listener: Option<Arc<dyn SerialListener>>) -> Self {
        Self {
            port,
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::Stopped),
                write_buffer: Mutex::new(Vec::with_capacity(BUFFER_CAPACITY)),
                listener: Mutex::new(listener),
            }),
        }
    }

    /// Replace the registered listener
    ///
    /// Takes effect on the next delivery.
    pub fn set_listener(&self, listener: Option<Arc<dyn SerialListener>>) {
        *self.shared.listener.lock().unwrap() = listener;
    }

    /// Currently registered listener
    pub fn listener(&self) -> Option<Arc<dyn SerialListener>> {
        self.shared.listener()
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.shared.run_state()
    }

    /// Start the service loop on a dedicated thread
    ///
    /// Fails with [`Error::AlreadyRunning`] unless the manager is
    /// Stopped.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        {
            let mut state = self.shared.state.lock().unwrap();
            if *state != RunState::Stopped {
                return Err(Error::AlreadyRunning);
            }
            *state = RunState::Running;
        }

        let port = Arc::clone(&self.port);
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("serial-io".to_string())
            .spawn(move || service_loop(port, shared));

        match spawned {
            Ok(handle) => Ok(handle),
            Err(e) => {
                *self.shared.state.lock().unwrap() = RunState::Stopped;
                Err(Error::Io(e))
            }
        }
    }

    /// Request loop termination at the next state check
    ///
    /// A no-op unless the manager is Running. Does not interrupt an
    /// in-flight transfer; shutdown latency is bounded by [`READ_WAIT`].
    pub fn stop(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if *state == RunState::Running {
            info!("stop requested");
            *state = RunState::Stopping;
        }
    }

    /// Enqueue bytes for the next drain cycle
    ///
    /// Never blocks on the transport. Exceeding the buffer capacity is
    /// [`Error::OutOfBuffer`], not truncation.
    pub fn write_async(&self, data: &[u8]) -> Result<()> {
        let mut buffer = self.shared.write_buffer.lock().unwrap();
        if buffer.len() + data.len() > BUFFER_CAPACITY {
            return Err(Error::OutOfBuffer {
                pending: buffer.len(),
                requested: data.len(),
                capacity: BUFFER_CAPACITY,
            });
        }
        buffer.extend_from_slice(data);
        Ok(())
    }
}

fn service_loop<P: SerialPort>(port: Arc<P>, shared: Arc<Shared>) {
    info!("serial I/O loop running");

    let outcome = run_iterations(&*port, &shared);

    // Stopped before the error callback so the failure is observable
    // as a terminal state from inside on_run_error.
    *shared.state.lock().unwrap() = RunState::Stopped;

    if let Err(error) = outcome {
        warn!("serial I/O loop ending on error: {}", error);
        if let Some(listener) = shared.listener() {
            listener.on_run_error(error);
        }
    }
    info!("serial I/O loop stopped");
}

fn run_iterations<P: SerialPort>(port: &P, shared: &Shared) -> Result<()> {
    // Poll buffer owned by the loop; no other reader touches it.
    let mut read_buffer = vec![0u8; BUFFER_CAPACITY];

    loop {
        if shared.run_state() != RunState::Running {
            debug!("stop observed");
            return Ok(());
        }

        // Drain phase: copy out under the lock, transfer outside it.
        let outgoing = {
            let mut buffer = shared.write_buffer.lock().unwrap();
            if buffer.is_empty() {
                None
            } else {
                let bytes = buffer.clone();
                buffer.clear();
                Some(bytes)
            }
        };
        let drained = outgoing.is_some();
        if let Some(bytes) = outgoing {
            debug!(len = bytes.len(), "draining write buffer");
            port.write(&bytes, Some(READ_WAIT))?;
        }

        // Poll phase: a bounded timeout with no data is an empty poll,
        // not an error.
        let received = port.read(&mut read_buffer, Some(READ_WAIT))?;
        if received > 0 {
            debug!(len = received, "read data");
            if let Some(listener) = shared.listener() {
                listener.on_new_data(read_buffer[..received].to_vec());
            }
        } else if !drained {
            thread::yield_now();
        }
    }
}
