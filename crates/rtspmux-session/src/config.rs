use std::time::Duration;

use rtspmux_frame::FrameConfig;

use crate::message::DEFAULT_MAX_MESSAGE_SIZE;

/// Default read deadline: a peer silent for this long ends the session.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime behavior of an interleaved session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frame limits and stream deadlines.
    pub frame: FrameConfig,
    /// Largest RTSP control message (headers + body) accepted from the peer.
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig {
                read_timeout: Some(DEFAULT_READ_TIMEOUT),
                write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
                ..FrameConfig::default()
            },
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfig {
    /// Override both stream deadlines.
    pub fn with_timeouts(mut self, read: Option<Duration>, write: Option<Duration>) -> Self {
        self.frame.read_timeout = read;
        self.frame.write_timeout = write;
        self
    }
}
