use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected RTSP stream (TCP, or a Unix socket in tests). Implements Read + Write.
///
/// Clones made with [`RtspStream::try_clone`] refer to the same connection:
/// shutting one down unblocks readers on every clone. This is how a session
/// is cancelled.
pub struct RtspStream {
    inner: RtspStreamInner,
    shut_down: Arc<AtomicBool>,
}

enum RtspStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for RtspStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RtspStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            RtspStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for RtspStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RtspStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            RtspStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            RtspStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            RtspStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl From<TcpStream> for RtspStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: RtspStreamInner::Tcp(stream),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for RtspStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: RtspStreamInner::Unix(stream),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl RtspStream {
    /// Create a connected pair of local streams.
    ///
    /// Handy for running a client session against an in-process peer.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from(left), Self::from(right)))
    }

    /// Set read timeout on the underlying stream.
    ///
    /// With a timeout set, a silent peer surfaces as an I/O error of kind
    /// `WouldBlock` or `TimedOut` instead of blocking forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        match &self.inner {
            RtspStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            RtspStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        match &self.inner {
            RtspStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            RtspStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        self.ensure_open()?;
        let inner = match &self.inner {
            RtspStreamInner::Tcp(stream) => RtspStreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            RtspStreamInner::Unix(stream) => RtspStreamInner::Unix(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            shut_down: Arc::clone(&self.shut_down),
        })
    }

    /// Shut down both directions of the connection.
    ///
    /// Blocked reads on any clone return. Calling this more than once is a
    /// no-op.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let res = match &self.inner {
            RtspStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            RtspStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match res {
            Ok(()) => {
                debug!(stream = ?self, "stream shut down");
                Ok(())
            }
            // The peer already tore the connection down.
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Whether [`RtspStream::shutdown`] was called on this stream or a clone.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Remote address, for TCP streams.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.inner {
            RtspStreamInner::Tcp(stream) => stream.peer_addr().ok(),
            #[cfg(unix)]
            RtspStreamInner::Unix(_) => None,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(TransportError::Shutdown);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RtspStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            RtspStreamInner::Tcp(stream) => f
                .debug_struct("RtspStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
            #[cfg(unix)]
            RtspStreamInner::Unix(_) => f.debug_struct("RtspStream").field("type", &"unix").finish(),
        }
    }
}
