//! RTSP interleaved transport.
//!
//! When RTP and RTCP are carried over the RTSP control connection, every
//! binary packet is wrapped in a 4-byte `$` frame and shares the TCP stream
//! with RTSP requests and responses. rtspmux splits that stream back apart,
//! routes frames to per-track consumers and serializes writes onto it.
//!
//! # Crate Structure
//!
//! - [`transport`]: connected TCP/Unix stream with shutdown-based cancellation
//! - [`frame`]: `$` frame codec, blocking reader/writer, channel assignment
//! - [`session`]: demultiplexer, channel router, shared writer, read loop
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//!
//! use rtspmux::frame::{ChannelAssignment, FrameReader};
//! use rtspmux::session::{ChannelRouter, RtspMessageParser, StreamDemultiplexer, Unit};
//!
//! let wire = b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n$\x00\x00\x02\xAA\xBB".to_vec();
//! let mut demux = StreamDemultiplexer::new(FrameReader::new(Cursor::new(wire)), RtspMessageParser::new());
//! let router: ChannelRouter = ChannelRouter::new(ChannelAssignment::conventional(1));
//!
//! assert!(matches!(demux.next_unit().unwrap(), Unit::Message(_)));
//! let Unit::Frame(frame) = demux.next_unit().unwrap() else { panic!() };
//! assert_eq!(router.resolve(frame.channel()).unwrap().track, 0);
//! ```

/// Re-export transport types.
pub mod transport {
    pub use rtspmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rtspmux_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use rtspmux_session::*;
}
