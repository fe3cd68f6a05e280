use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use rtspmux_transport::RtspStream;
use tracing::trace;

use crate::codec::{decode_frame, truncation_error, FrameConfig, InterleavedFrame, MAGIC};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Sequential buffered reader over a shared RTSP stream.
///
/// The internal buffer is the read cursor of the connection: bytes are only
/// removed from it when a complete unit has been decoded. Callers that parse
/// other unit kinds from the same stream (RTSP messages) work on
/// [`FrameReader::buffer_mut`] and pull more data with [`FrameReader::fill_buf`].
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached before
    /// the first byte of a frame, and a truncation error when EOF is reached
    /// inside one.
    pub fn read_frame(&mut self) -> Result<InterleavedFrame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.effective_max_payload())? {
                trace!(
                    channel = frame.channel(),
                    len = frame.payload_len(),
                    "decoded interleaved frame"
                );
                return Ok(frame);
            }

            if self.fill_buf()? == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(truncation_error(&self.buf));
            }
        }
    }

    /// Peek at the first byte of the next unit without consuming it.
    ///
    /// Returns `Ok(None)` on a clean end of stream.
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        while self.buf.is_empty() {
            if self.fill_buf()? == 0 {
                return Ok(None);
            }
        }
        Ok(Some(self.buf[0]))
    }

    /// Whether the next buffered unit starts with the frame magic byte.
    pub fn at_frame(&self) -> bool {
        self.buf.first() == Some(&MAGIC)
    }

    /// Pull one chunk from the inner stream into the buffer.
    ///
    /// Returns the number of bytes added, 0 on end of stream.
    pub fn fill_buf(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Bytes read from the stream but not yet consumed as a unit.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable access to the unconsumed bytes.
    ///
    /// Anything removed from the front must be exactly one whole unit.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    ///
    /// Buffered bytes are discarded.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<RtspStream> {
    /// Create a frame reader for `RtspStream` and apply read timeout from config.
    pub fn with_config_stream(inner: RtspStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: rtspmux_transport::TransportError) -> FrameError {
    match err {
        rtspmux_transport::TransportError::Io(io) => FrameError::Io(io),
        rtspmux_transport::TransportError::Shutdown => FrameError::ConnectionClosed,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::time::Duration;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_frame, MAX_PAYLOAD};

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(0, &[0xAA, 0xBB], &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.channel(), 0);
        assert_eq!(frame.payload().as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn read_multiple_frames() {
        let mut wire = BytesMut::new();
        encode_frame(0, b"rtp", &mut wire).unwrap();
        encode_frame(1, b"", &mut wire).unwrap();
        encode_frame(3, b"rtcp", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.channel(), f1.payload().as_ref()), (0, b"rtp".as_ref()));
        assert_eq!((f2.channel(), f2.payload().as_ref()), (1, b"".as_ref()));
        assert_eq!((f3.channel(), f3.payload().as_ref()), (3, b"rtcp".as_ref()));
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_frame_with_max_payload() {
        let payload = vec![0xAB; MAX_PAYLOAD];
        let mut wire = BytesMut::new();
        encode_frame(9, &payload, &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.channel(), 9);
        assert_eq!(frame.payload().as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(4, b"slow", &mut wire).unwrap();

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.channel(), 4);
        assert_eq!(frame.payload().as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn truncated_header() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x24, 0x00]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::TruncatedHeader { read: 2 }));
    }

    #[test]
    fn truncated_payload() {
        let mut partial = BytesMut::new();
        partial.put_u8(MAGIC);
        partial.put_u8(2);
        partial.put_u16(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::TruncatedPayload {
                expected: 16,
                read: 9
            }
        ));
    }

    #[test]
    fn invalid_magic_in_stream() {
        let mut reader = FrameReader::new(Cursor::new(b"RTSP/1.0 200 OK\r\n\r\n".to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame { found: b'R' }));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        encode_frame(1, &[0u8; 1024], &mut wire).unwrap();

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::OversizedPayload { .. }));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut wire = BytesMut::new();
        encode_frame(5, b"x", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.peek_byte().unwrap(), Some(MAGIC));
        assert_eq!(reader.peek_byte().unwrap(), Some(MAGIC));
        assert!(reader.at_frame());

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.channel(), 5);
        assert_eq!(reader.peek_byte().unwrap(), None);
        assert!(!reader.at_frame());
    }

    #[test]
    fn frame_leaves_following_bytes_buffered() {
        let mut wire = BytesMut::new();
        encode_frame(0, b"ab", &mut wire).unwrap();
        wire.put_slice(b"RTSP/1.0 200 OK\r\n\r\n");

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        reader.read_frame().unwrap();
        assert_eq!(reader.buffer(), b"RTSP/1.0 200 OK\r\n\r\n");
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            if buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = RtspStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(1, b"rtcp-rr").unwrap();
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.channel(), 1);
        assert_eq!(frame.payload().as_ref(), b"rtcp-rr");
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let mut wire = BytesMut::new();
        encode_frame(7, b"ok", &mut wire).unwrap();

        let reader = WouldBlockThenData {
            state: 0,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
        assert!(err.is_timeout());
    }

    struct WouldBlockThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_frame(8, b"ok", &mut wire).unwrap();

        let reader = InterruptedThenData {
            state: 0,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();

        assert_eq!(frame.channel(), 8);
        assert_eq!(frame.payload().as_ref(), b"ok");
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    #[cfg(unix)]
    fn applies_read_timeout_for_rtsp_stream() {
        let (left, mut right) = RtspStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };

        let mut reader = FrameReader::with_config_stream(left, cfg).unwrap();
        let err = reader.read_frame().unwrap_err();
        assert!(err.is_timeout());

        right.write_all(&[0x24, 0x00, 0x00, 0x00]).unwrap();
        let frame = reader.read_frame().unwrap();
        assert!(frame.payload().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn shut_down_stream_is_rejected() {
        let (left, _right) = RtspStream::pair().unwrap();
        left.shutdown().unwrap();

        let result = FrameReader::with_config_stream(left, FrameConfig::default());
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.set_max_payload_size(10);
        assert_eq!(reader.config().max_payload_size, 10);
        let _inner = reader.into_inner();
    }
}
