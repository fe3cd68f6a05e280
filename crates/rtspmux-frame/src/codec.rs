use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (1) + channel (1) + length (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Magic byte: `$` (0x24).
pub const MAGIC: u8 = 0x24;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// An interleaved RTP/RTCP frame.
///
/// The payload length is never stored on its own: it is always the length of
/// `payload`, and [`InterleavedFrame::new`] refuses payloads the wire format
/// cannot describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterleavedFrame {
    channel: u8,
    payload: Bytes,
}

impl InterleavedFrame {
    /// Create a new frame.
    pub fn new(channel: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        check_payload_len(payload.len())?;
        Ok(Self { channel, payload })
    }

    /// The channel this frame was sent on.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The RTP or RTCP packet carried by this frame.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame, keeping only the payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Append the wire encoding of this frame to `dst`.
    pub fn marshal_to(&self, dst: &mut BytesMut) {
        put_frame(self.channel, &self.payload, dst);
    }

    /// Encode this frame into a fresh buffer of exactly [`Self::wire_size`] bytes.
    pub fn marshal(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        self.marshal_to(&mut dst);
        dst.freeze()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬─────────────┬──────────────────┐
/// │ Magic    │ Channel  │ Length      │ Payload          │
/// │ 0x24 '$' │ (1B)     │ (2B BE)     │ (Length bytes)   │
/// └──────────┴──────────┴─────────────┴──────────────────┘
/// ```
///
/// Oversized payloads are rejected before anything is appended to `dst`.
pub fn encode_frame(channel: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    check_payload_len(payload.len())?;
    put_frame(channel, payload, dst);
    Ok(())
}

fn put_frame(channel: u8, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(MAGIC);
    dst.put_u8(channel);
    dst.put_u16(payload.len() as u16);
    dst.put_slice(payload);
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD {
        return Err(FrameError::OversizedPayload {
            size: len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<InterleavedFrame>> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };
    if first != MAGIC {
        return Err(FrameError::MalformedFrame { found: first });
    }
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let channel = src[1];
    let payload_len = u16::from_be_bytes([src[2], src[3]]) as usize;

    if payload_len > max_payload {
        return Err(FrameError::OversizedPayload {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(InterleavedFrame { channel, payload }))
}

/// Classify a stream that ended while `buffered` held the start of a frame.
///
/// `buffered` must begin with [`MAGIC`] and hold less than a complete frame.
pub fn truncation_error(buffered: &[u8]) -> FrameError {
    if buffered.len() < HEADER_SIZE {
        return FrameError::TruncatedHeader {
            read: buffered.len(),
        };
    }
    let expected = u16::from_be_bytes([buffered[2], buffered[3]]) as usize;
    FrameError::TruncatedPayload {
        expected,
        read: buffered.len() - HEADER_SIZE,
    }
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Capped at [`MAX_PAYLOAD`].
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// Payload limit actually enforced: the configured size, capped at [`MAX_PAYLOAD`].
    pub fn effective_max_payload(&self) -> usize {
        self.max_payload_size.min(MAX_PAYLOAD)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"\x80\x60\x00\x01rtp";
        let channel = 2u8;

        encode_frame(channel, payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());
        assert_eq!(&buf[..4], &[0x24, 0x02, 0x00, 0x07]);

        let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();

        assert_eq!(frame.channel(), channel);
        assert_eq!(frame.payload().as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_every_channel_roundtrips() {
        let mut buf = BytesMut::new();
        for channel in 0..=u8::MAX {
            encode_frame(channel, &[channel], &mut buf).unwrap();
        }
        for channel in 0..=u8::MAX {
            let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
            assert_eq!(frame.channel(), channel);
            assert_eq!(frame.payload().as_ref(), &[channel]);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_max_payload_roundtrip() {
        let payload = vec![0x5A; MAX_PAYLOAD];
        let frame = InterleavedFrame::new(7, payload.clone()).unwrap();
        let mut wire = BytesMut::from(frame.marshal().as_ref());

        assert_eq!(wire.len(), HEADER_SIZE + MAX_PAYLOAD);
        assert_eq!(&wire[2..4], &[0xFF, 0xFF]);

        let decoded = decode_frame(&mut wire, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_oversized_payload_rejected_before_encoding() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let mut buf = BytesMut::new();

        let err = encode_frame(1, &payload, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::OversizedPayload { size, max } if size == MAX_PAYLOAD + 1 && max == MAX_PAYLOAD
        ));
        assert!(buf.is_empty());

        let err = InterleavedFrame::new(1, payload).unwrap_err();
        assert!(matches!(err, FrameError::OversizedPayload { .. }));
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x24, 0x01][..]);
        let result = decode_frame(&mut buf, MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&b"RTSP/1.0 200 OK\r\n"[..]);
        let result = decode_frame(&mut buf, MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::MalformedFrame { found: b'R' })));
    }

    #[test]
    fn test_decode_respects_local_limit() {
        let mut buf = BytesMut::new();
        encode_frame(0, &[0u8; 32], &mut buf).unwrap();

        let result = decode_frame(&mut buf, 16);
        assert!(matches!(
            result,
            Err(FrameError::OversizedPayload { size: 32, max: 16 })
        ));
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x24, 0x01, 0x00, 0x00]);

        let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.channel(), 1);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_truncation_classification() {
        assert!(matches!(
            truncation_error(&[0x24, 0x00]),
            FrameError::TruncatedHeader { read: 2 }
        ));
        assert!(matches!(
            truncation_error(&[0x24, 0x00, 0x00, 0x08, 0xAA]),
            FrameError::TruncatedPayload {
                expected: 8,
                read: 1
            }
        ));
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = InterleavedFrame::new(1, Bytes::from_static(b"test")).unwrap();
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
        assert_eq!(frame.payload_len(), 4);
        assert_eq!(frame.marshal().len(), frame.wire_size());
    }

    #[test]
    fn test_config_caps_max_payload() {
        let cfg = FrameConfig {
            max_payload_size: usize::MAX,
            ..FrameConfig::default()
        };
        assert_eq!(cfg.effective_max_payload(), MAX_PAYLOAD);
    }
}
