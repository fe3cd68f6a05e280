//! Shared write side of a connection.
//!
//! Control requests and interleaved frames from any thread take one lock per
//! unit, so bytes of two units never interleave on the wire.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use rtspmux_frame::{FrameError, FrameWriter, InterleavedFrame, MAX_PAYLOAD};
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::message::RtspMessage;

/// Serializes every outgoing unit on the shared connection.
///
/// RTSP requests and interleaved frames (RTCP receiver reports, keep-alive
/// data) go through the same lock, so a unit is always written whole before
/// the next one starts. Clones share the lock and the underlying stream.
pub struct SessionWriter<W> {
    inner: Arc<Mutex<FrameWriter<W>>>,
}

impl<W> Clone for SessionWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SessionWriter<W> {
    pub fn new(writer: FrameWriter<W>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Marshal and write one interleaved frame.
    ///
    /// Oversized payloads are rejected before the lock is taken.
    pub fn write_frame(&self, channel: u8, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::OversizedPayload {
                size: payload.len(),
                max: MAX_PAYLOAD,
            }
            .into());
        }
        let mut writer = self.lock()?;
        writer.send(channel, payload)?;
        debug!(channel, len = payload.len(), "wrote interleaved frame");
        Ok(())
    }

    /// Write an already-built frame.
    pub fn write_interleaved(&self, frame: &InterleavedFrame) -> Result<()> {
        self.write_frame(frame.channel(), frame.payload())
    }

    /// Write an RTSP request or response.
    pub fn write_message(&self, message: &RtspMessage) -> Result<()> {
        let bytes = message.to_bytes();
        self.write_raw(&bytes)?;
        debug!(start_line = %message.start_line, "wrote rtsp message");
        Ok(())
    }

    /// Write pre-serialized bytes as one unit.
    pub fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.lock()?;
        writer.write_raw(bytes)?;
        Ok(())
    }

    /// Run `f` with exclusive access to the underlying writer.
    pub fn with_writer<T>(&self, f: impl FnOnce(&mut FrameWriter<W>) -> T) -> Result<T> {
        let mut writer = self.lock()?;
        Ok(f(&mut writer))
    }

    fn lock(&self) -> Result<MutexGuard<'_, FrameWriter<W>>> {
        self.inner.lock().map_err(|_| SessionError::WriterPoisoned)
    }
}
