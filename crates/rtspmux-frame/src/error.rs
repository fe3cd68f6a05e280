/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame was expected but the unit does not start with `$`.
    #[error("malformed frame: expected magic byte 0x24, found 0x{found:02x}")]
    MalformedFrame { found: u8 },

    /// The stream ended inside the 4-byte frame header.
    #[error("truncated frame header ({read} of 4 bytes)")]
    TruncatedHeader { read: usize },

    /// The stream ended before the announced payload was complete.
    #[error("truncated frame payload ({read} of {expected} bytes)")]
    TruncatedPayload { expected: usize, read: usize },

    /// The payload does not fit in the 16-bit length field or exceeds the
    /// configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    OversizedPayload { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed cleanly between two units.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether this error means the read or write deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
