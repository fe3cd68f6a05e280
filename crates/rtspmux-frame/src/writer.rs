use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use rtspmux_transport::RtspStream;

use crate::codec::{encode_frame, FrameConfig, InterleavedFrame, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = HEADER_SIZE + 2048;

/// Writes complete units to any `Write` stream.
///
/// Every call writes one whole unit (an interleaved frame, or raw RTSP
/// message bytes) before returning. The scratch buffer used for marshaling
/// is cleared before each use.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &InterleavedFrame) -> Result<()> {
        self.send(frame.channel(), frame.payload().as_ref())
    }

    /// Encode and send a payload on a channel.
    ///
    /// Payloads over the limit are rejected before any byte reaches the stream.
    /// An I/O error, including an expired write deadline, may leave part of the
    /// frame on the wire, so the connection cannot be reused afterwards.
    pub fn send(&mut self, channel: u8, payload: &[u8]) -> Result<()> {
        let max = self.config.effective_max_payload();
        if payload.len() > max {
            return Err(FrameError::OversizedPayload {
                size: payload.len(),
                max,
            });
        }

        self.buf.clear();
        encode_frame(channel, payload, &mut self.buf)?;

        write_all(&mut self.inner, &self.buf)?;
        self.flush()
    }

    /// Write already-serialized bytes as one unit, e.g. an RTSP request.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        write_all(&mut self.inner, bytes)?;
        self.flush()
    }

    /// Flush the underlying stream.
    ///
    /// An expired write deadline surfaces as `FrameError::Io` with
    /// `WouldBlock` or `TimedOut`; see [`FrameError::is_timeout`].
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn write_all<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            // Also covers SO_SNDTIMEO expiry, reported as WouldBlock.
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

impl FrameWriter<RtspStream> {
    /// Create a frame writer for `RtspStream` and apply write timeout from config.
    pub fn with_config_stream(inner: RtspStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
