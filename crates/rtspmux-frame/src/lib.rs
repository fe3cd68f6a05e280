//! RTSP interleaved framing for RTP/RTCP over the RTSP control connection.
//!
//! Every binary unit on the shared stream is framed with:
//! - a 1-byte magic marker (`$`, 0x24) that tells it apart from RTSP text
//! - a 1-byte channel ID identifying the track and RTP/RTCP sub-stream
//! - a 2-byte big-endian payload length
//!
//! There is no checksum and no padding; integrity comes from TCP.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use channel::{AssignmentError, ChannelAssignment, ChannelKind, ChannelLookup, ChannelRoute};
pub use codec::{
    decode_frame, encode_frame, truncation_error, FrameConfig, InterleavedFrame, HEADER_SIZE,
    MAGIC, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
