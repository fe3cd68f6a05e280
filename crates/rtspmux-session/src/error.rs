use crate::message::MessageError;

/// Errors that can occur in an interleaved session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rtspmux_transport::TransportError),

    /// Frame-level error (malformed, truncated, oversized, I/O).
    #[error("frame error: {0}")]
    Frame(#[from] rtspmux_frame::FrameError),

    /// An RTSP control message could not be framed.
    #[error("rtsp message error: {0}")]
    Message(#[from] MessageError),

    /// A frame arrived on a channel that was never set up.
    #[error("no track assigned to channel {channel}")]
    UnknownChannel { channel: u8 },

    /// A frame arrived for a track nobody consumes.
    #[error("channel {channel}: no consumer registered for track {track}")]
    NoConsumer { channel: u8, track: usize },

    /// A writer panicked while holding the write lock.
    #[error("session writer lock poisoned")]
    WriterPoisoned,
}

impl SessionError {
    /// Whether the connection must be torn down after this error.
    ///
    /// Routing failures leave the stream aligned on the next unit, so the read
    /// loop can keep going. Everything else means the byte position can no
    /// longer be trusted, or the connection is gone.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SessionError::UnknownChannel { .. } | SessionError::NoConsumer { .. }
        )
    }

    /// Whether this error means the read or write deadline expired.
    pub fn is_timeout(&self) -> bool {
        match self {
            SessionError::Frame(err) => err.is_timeout(),
            SessionError::Transport(rtspmux_transport::TransportError::Io(err)) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Whether the peer closed the connection cleanly between two units.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            SessionError::Frame(rtspmux_frame::FrameError::ConnectionClosed)
        )
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Frame(rtspmux_frame::FrameError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
