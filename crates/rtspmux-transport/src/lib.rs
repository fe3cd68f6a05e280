//! Connected byte streams for RTSP interleaved transport.
//!
//! This is the lowest layer of rtspmux. A single [`RtspStream`] carries both
//! RTSP control messages and `$`-framed RTP/RTCP data; the upper layers split
//! it into one reader and one writer with [`RtspStream::try_clone`].
//!
//! Dialing (DNS, TLS, connect) happens elsewhere: hand an already connected
//! `TcpStream` to [`RtspStream::from`].

pub mod error;
pub mod stream;

pub use error::{Result, TransportError};
pub use stream::RtspStream;
