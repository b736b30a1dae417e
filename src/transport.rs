//! UDP transport layer for FINS communication.
//!
//! This module provides the [`UdpTransport`] struct which handles low-level
//! UDP communication with Omron PLCs. The transport layer is completely
//! separated from the protocol layer—it only knows about sockets and bytes.
//!
//! # Design
//!
//! The transport layer follows these principles:
//!
//! - **Protocol agnostic** - Handles only byte transmission, no FINS knowledge
//! - **Synchronous** - Blocking send/receive with configurable timeout
//! - **Simple** - One socket, one remote address, no connection pooling
//! - **Retrying** - `send_receive` retries transport-level failures
//!   (timeouts, socket errors) up to [`MAX_RETRIES`] times with a linear
//!   backoff; it never retries on its own for a PLC-reported protocol error,
//!   since that is not a transport failure.
//!
//! # Constants
//!
//! - [`DEFAULT_FINS_PORT`] - Default FINS UDP port (9600)
//! - [`DEFAULT_TIMEOUT`] - Default per-attempt timeout (5 seconds)
//! - [`MAX_PACKET_SIZE`] - Receive buffer size (4096 bytes)
//! - [`MAX_RETRIES`] - Maximum retry attempts after the first send (3)
//!
//! # Example
//!
//! ```no_run
//! use omron_fins::UdpTransport;
//! use std::time::Duration;
//!
//! let mut transport = UdpTransport::new(
//!     "192.168.1.10:9600".parse().unwrap(),
//!     Duration::from_secs(5),
//! ).unwrap();
//!
//! // Send a FINS frame and receive response
//! let request = vec![0x80, 0x00, 0x02, /* ... rest of FINS frame */];
//! let response = transport.send_receive(&request);
//! ```

use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{FinsError, Result};

/// Default FINS UDP port.
pub const DEFAULT_FINS_PORT: u16 = 9600;

/// Default per-attempt timeout for UDP operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive buffer size. Large enough for a full multiple-read response of
/// 20 one-word entries plus the widest individual read this crate issues.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Maximum number of retries after the first attempt. Each retry waits
/// `0.1 * attempt` seconds before resending (attempt 1 waits 100ms, attempt
/// 2 waits 200ms, attempt 3 waits 300ms).
pub const MAX_RETRIES: u32 = 3;

/// UDP transport for FINS communication.
///
/// Handles synchronous UDP communication with configurable timeout and a
/// bounded retry budget. Owned by exactly one Poller at a time; issuing
/// concurrent requests on the same instance is a caller bug, not something
/// this type guards against (FINS/UDP correlates responses by SID and
/// packet order, not by a multiplexed connection).
pub struct UdpTransport {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    connected: bool,
    last_activity: Option<Instant>,
}

impl UdpTransport {
    /// Creates a new UDP transport connected to the specified PLC address.
    ///
    /// # Arguments
    ///
    /// * `plc_addr` - Socket address of the PLC (IP:port)
    /// * `timeout` - Per-attempt read/write timeout duration
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be created or configured.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use omron_fins::UdpTransport;
    /// use std::time::Duration;
    ///
    /// let transport = UdpTransport::new(
    ///     "192.168.1.10:9600".parse().unwrap(),
    ///     Duration::from_secs(5),
    /// ).unwrap();
    /// ```
    pub fn new(plc_addr: SocketAddr, timeout: Duration) -> Result<Self> {
        // Bind to any available local port
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        // Connect to the PLC (required for proper FINS communication)
        socket.connect(plc_addr)?;
        socket.set_read_timeout(Some(timeout))?;
        socket.set_write_timeout(Some(timeout))?;

        Ok(Self {
            socket,
            remote_addr: plc_addr,
            connected: true,
            last_activity: None,
        })
    }

    /// Creates a new UDP transport with the default timeout.
    ///
    /// # Arguments
    ///
    /// * `plc_addr` - Socket address of the PLC (IP:port)
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be created or configured.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use omron_fins::UdpTransport;
    ///
    /// let transport = UdpTransport::with_default_timeout(
    ///     "192.168.1.10:9600".parse().unwrap(),
    /// ).unwrap();
    /// ```
    pub fn with_default_timeout(plc_addr: SocketAddr) -> Result<Self> {
        Self::new(plc_addr, DEFAULT_TIMEOUT)
    }

    /// Sends a FINS frame and receives the response, retrying transport
    /// failures up to [`MAX_RETRIES`] times with a linear backoff.
    ///
    /// This never retries on protocol errors — a well-formed response
    /// carrying a non-success end code is returned to the caller as-is;
    /// only the absence of any usable response (timeout, socket error) is
    /// eligible for retry.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::TimeoutError` if every attempt times out, or
    /// `FinsError::ConnectionError` if the socket reports a terminal error
    /// after the retry budget is exhausted.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use omron_fins::UdpTransport;
    /// use std::time::Duration;
    ///
    /// let transport = UdpTransport::new(
    ///     "192.168.1.10:9600".parse().unwrap(),
    ///     Duration::from_secs(5),
    /// ).unwrap();
    ///
    /// let request = vec![0x80, 0x00, 0x02, /* ... */];
    /// let response = transport.send_receive(&request).unwrap();
    /// ```
    pub fn send_receive(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut attempt = 0u32;
        loop {
            match self.try_send_receive(data) {
                Ok(response) => {
                    self.last_activity = Some(Instant::now());
                    return Ok(response);
                }
                Err(err) if attempt < MAX_RETRIES => {
                    log::warn!(
                        "transport attempt {} to {} failed: {err}; retrying",
                        attempt + 1,
                        self.remote_addr
                    );
                    attempt += 1;
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
                Err(err) => {
                    if !matches!(err, FinsError::TimeoutError) {
                        self.connected = false;
                    }
                    return Err(err);
                }
            }
        }
    }

    fn try_send_receive(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.socket.send(data)?;

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];
        match self.socket.recv(&mut buffer) {
            Ok(size) => {
                buffer.truncate(size);
                Ok(buffer)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(FinsError::TimeoutError),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(FinsError::TimeoutError),
            Err(e) => Err(FinsError::ConnectionError(e)),
        }
    }

    /// Returns the remote PLC address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns a reference to the underlying socket.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// Whether the socket is open and has not observed a terminal error.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// The time of the last successful receive, if any.
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.socket.local_addr().ok())
            .field("connected", &self.connected)
            .finish()
    }
}
