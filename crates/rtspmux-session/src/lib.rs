//! Interleaved session plumbing for RTSP over TCP.
//!
//! One connection carries RTSP control messages and `$`-framed RTP/RTCP
//! packets. This crate splits that stream into units, hands frames to the
//! consumer of their track and serializes every write back onto the
//! connection:
//!
//! - [`StreamDemultiplexer`] owns the read cursor and yields [`Unit`]s
//! - [`ChannelRouter`] maps a frame's channel to a track and delivers it
//! - [`SessionWriter`] lets several senders share the write half
//! - [`InterleavedSession`] runs the read loop over all of the above
//!
//! With the `async` feature, [`DemuxCodec`] offers the same classification
//! as a `tokio-util` codec.

#[cfg(feature = "async")]
pub mod codec;
pub mod config;
pub mod demux;
pub mod error;
pub mod message;
pub mod router;
pub mod session;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::DemuxCodec;
pub use config::{SessionConfig, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
pub use demux::{classify, StreamDemultiplexer, Unit, UnitKind};
pub use error::{Result, SessionError};
pub use message::{
    MessageError, MessageParser, RtspMessage, RtspMessageParser, DEFAULT_MAX_MESSAGE_SIZE,
};
pub use router::{ChannelRouter, QueuedConsumer, TrackConsumer, TrackPacket};
pub use session::{Event, InterleavedSession, SessionCloser, SessionStats};
pub use writer::SessionWriter;
