//! `tokio-util` codec for interleaved streams.
//!
//! Applies the same first-byte classification as the blocking
//! [`StreamDemultiplexer`](crate::StreamDemultiplexer), for callers that
//! drive the connection with `FramedRead`/`FramedWrite`.

use bytes::BytesMut;
use rtspmux_frame::{decode_frame, truncation_error, FrameConfig, InterleavedFrame, MAGIC};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::demux::{classify, Unit, UnitKind};
use crate::error::SessionError;
use crate::message::{parse_one, MessageError, MessageParser, RtspMessage};

/// Decoder for interleaved units, encoder for frames and RTSP messages.
#[derive(Debug, Clone)]
pub struct DemuxCodec<P> {
    parser: P,
    max_payload: usize,
}

impl<P: MessageParser> DemuxCodec<P> {
    pub fn new(parser: P) -> Self {
        Self::with_config(parser, &FrameConfig::default())
    }

    pub fn with_config(parser: P, config: &FrameConfig) -> Self {
        Self {
            parser,
            max_payload: config.effective_max_payload(),
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }
}

impl<P: MessageParser> Decoder for DemuxCodec<P> {
    type Item = Unit<P::Message>;
    type Error = SessionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(&first) = src.first() else {
            return Ok(None);
        };

        match classify(first) {
            UnitKind::Frame => {
                let frame = decode_frame(src, self.max_payload)?;
                if let Some(frame) = &frame {
                    trace!(channel = frame.channel(), len = frame.payload_len(), "decoded frame");
                }
                Ok(frame.map(Unit::Frame))
            }
            UnitKind::Message => {
                let message = parse_one(&mut self.parser, src)?;
                Ok(message.map(|(message, _)| Unit::Message(message)))
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(unit) = self.decode(src)? {
            return Ok(Some(unit));
        }
        if src.is_empty() {
            return Ok(None);
        }
        if src[0] == MAGIC {
            return Err(truncation_error(src).into());
        }
        Err(MessageError::Truncated {
            buffered: src.len(),
        }
        .into())
    }
}

impl<P> Encoder<InterleavedFrame> for DemuxCodec<P> {
    type Error = SessionError;

    fn encode(&mut self, item: InterleavedFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.marshal_to(dst);
        Ok(())
    }
}

impl<P> Encoder<RtspMessage> for DemuxCodec<P> {
    type Error = SessionError;

    fn encode(&mut self, item: RtspMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.to_bytes());
        Ok(())
    }
}
