//! TCP link to the treatment device.
//!
//! The device controller listens on a TCP port and accepts one path frame
//! (see [`zigscan_export::wire`]) per sample over a connection kept open
//! for the whole session.

use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use zigscan_export::{WireError, encode_path_frame};
use zigscan_pipeline::{PathSink, WorldPoint};

/// Default write and connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the device link.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The address did not resolve to anything.
    #[error("device address {0:?} does not resolve")]
    Unresolved(String),

    /// No resolved address accepted a connection.
    #[error("cannot connect to device at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The path cannot be put on the wire.
    #[error(transparent)]
    Encode(#[from] WireError),

    /// The connection failed while sending.
    #[error("sending to device at {peer} failed: {source}")]
    Send {
        peer: SocketAddr,
        source: std::io::Error,
    },
}

/// A persistent connection to the device controller.
#[derive(Debug)]
pub struct TcpDeviceLink {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpDeviceLink {
    /// Connect to `addr` (e.g. `"192.168.0.10:5000"`), trying every
    /// resolved address in turn.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Unresolved`] if `addr` yields no address and
    /// [`DeviceError::Connect`] with the last failure if none accepts.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, DeviceError> {
        let connect_err = |source| DeviceError::Connect {
            addr: addr.to_owned(),
            source,
        };
        let candidates: Vec<SocketAddr> = addr.to_socket_addrs().map_err(connect_err)?.collect();

        let mut last = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(timeout)).map_err(connect_err)?;
                    stream.set_nodelay(true).map_err(connect_err)?;
                    tracing::info!(peer = %candidate, "connected to device");
                    return Ok(Self {
                        stream,
                        peer: candidate,
                    });
                }
                Err(err) => {
                    tracing::debug!(peer = %candidate, error = %err, "device address refused");
                    last = Some(err);
                }
            }
        }
        Err(last.map_or_else(|| DeviceError::Unresolved(addr.to_owned()), connect_err))
    }

    /// Wrap an already connected stream.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Connect`] if the stream has no peer.
    pub fn from_stream(stream: TcpStream) -> Result<Self, DeviceError> {
        let peer = stream.peer_addr().map_err(|source| DeviceError::Connect {
            addr: String::from("<stream>"),
            source,
        })?;
        Ok(Self { stream, peer })
    }

    /// Address of the device controller.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl PathSink for TcpDeviceLink {
    type Error = DeviceError;

    fn send(&mut self, sample_id: i32, path: &[WorldPoint]) -> Result<(), DeviceError> {
        let frame = encode_path_frame(sample_id, path)?;
        let peer = self.peer;
        self.stream
            .write_all(&frame)
            .and_then(|()| self.stream.flush())
            .map_err(|source| DeviceError::Send { peer, source })?;
        tracing::info!(%peer, sample_id, points = path.len(), bytes = frame.len(), "path sent");
        Ok(())
    }
}
