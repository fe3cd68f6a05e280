//! Classification of units on the shared read stream.
//!
//! The first byte of each unit decides its kind: `$` starts an interleaved
//! frame, anything else starts an RTSP control message. After a unit is
//! returned the read cursor sits exactly on the first byte of the next one.
//! When the stream ends or breaks inside a unit there is no way back to a
//! unit boundary, so those errors are final for the connection.

use std::io::Read;

use rtspmux_frame::{FrameError, FrameReader, InterleavedFrame, MAGIC};
use tracing::trace;

use crate::error::Result;
use crate::message::{parse_one, MessageError, MessageParser};

/// One unit read from the shared stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit<M> {
    /// An RTSP request or response.
    Message(M),
    /// A binary RTP/RTCP frame.
    Frame(InterleavedFrame),
}

impl<M> Unit<M> {
    pub fn is_frame(&self) -> bool {
        matches!(self, Unit::Frame(_))
    }
}

/// Which kind of unit a leading byte announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Message,
    Frame,
}

/// Classify a unit by its first byte.
pub fn classify(first: u8) -> UnitKind {
    if first == MAGIC {
        UnitKind::Frame
    } else {
        UnitKind::Message
    }
}

/// Owns the single read cursor of a connection.
pub struct StreamDemultiplexer<R, P> {
    reader: FrameReader<R>,
    parser: P,
}

impl<R: Read, P: MessageParser> StreamDemultiplexer<R, P> {
    pub fn new(reader: FrameReader<R>, parser: P) -> Self {
        Self { reader, parser }
    }

    /// Read the next unit (blocking).
    ///
    /// A clean end of stream between units yields
    /// `SessionError::Frame(FrameError::ConnectionClosed)`.
    pub fn next_unit(&mut self) -> Result<Unit<P::Message>> {
        let Some(first) = self.reader.peek_byte()? else {
            return Err(FrameError::ConnectionClosed.into());
        };

        match classify(first) {
            UnitKind::Frame => {
                let frame = self.reader.read_frame()?;
                Ok(Unit::Frame(frame))
            }
            UnitKind::Message => {
                let message = self.read_message()?;
                Ok(Unit::Message(message))
            }
        }
    }

    fn read_message(&mut self) -> Result<P::Message> {
        loop {
            if let Some((message, consumed)) = parse_one(&mut self.parser, self.reader.buffer_mut())? {
                trace!(consumed, "parsed rtsp message");
                return Ok(message);
            }

            if self.reader.fill_buf()? == 0 {
                return Err(MessageError::Truncated {
                    buffered: self.reader.buffer().len(),
                }
                .into());
            }
        }
    }

    /// Bytes received but not yet returned as a unit.
    pub fn buffered(&self) -> &[u8] {
        self.reader.buffer()
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn reader(&self) -> &FrameReader<R> {
        &self.reader
    }

    pub fn into_parts(self) -> (FrameReader<R>, P) {
        (self.reader, self.parser)
    }
}
