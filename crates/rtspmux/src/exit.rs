use std::fmt;
use std::io;

use rtspmux_frame::{AssignmentError, FrameError};
use rtspmux_session::{MessageError, SessionError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(FAILURE, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::MalformedFrame { .. }
        | FrameError::TruncatedHeader { .. }
        | FrameError::TruncatedPayload { .. }
        | FrameError::OversizedPayload { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Message(MessageError::Truncated { .. })
        | SessionError::Message(MessageError::TooLarge { .. })
        | SessionError::Message(MessageError::InvalidUtf8)
        | SessionError::Message(MessageError::InvalidHeader(_))
        | SessionError::Message(MessageError::InvalidContentLength(_)) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn assignment_error(err: AssignmentError) -> CliError {
    CliError::new(USAGE, format!("invalid channel assignment: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_streams_map_to_data_invalid() {
        assert_eq!(
            frame_error("dump", FrameError::TruncatedHeader { read: 2 }).code,
            DATA_INVALID
        );
        assert_eq!(
            session_error("dump", SessionError::Message(MessageError::Truncated { buffered: 4 })).code,
            DATA_INVALID
        );
        assert_eq!(
            session_error("dump", SessionError::from(FrameError::MalformedFrame { found: 0 })).code,
            DATA_INVALID
        );
    }

    #[test]
    fn other_failures_map_to_failure() {
        assert_eq!(
            frame_error("dump", FrameError::Io(io::Error::other("reset"))).code,
            FAILURE
        );
        assert_eq!(session_error("dump", SessionError::WriterPoisoned).code, FAILURE);
    }
}
