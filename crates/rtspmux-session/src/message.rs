//! RTSP control message framing.
//!
//! The demultiplexer only needs to know where one control message ends and
//! the next unit begins. [`MessageParser`] is that seam; [`RtspMessageParser`]
//! is the stock implementation, splitting on the blank line after the
//! headers and honoring `Content-Length` for the body. Method and status
//! semantics are left to the caller.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Default upper bound for one control message (headers + body).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors raised while framing an RTSP control message.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The header block is not valid UTF-8.
    #[error("rtsp header block is not valid UTF-8")]
    InvalidUtf8,

    /// A header line has no `name: value` shape.
    #[error("invalid rtsp header line: {0:?}")]
    InvalidHeader(String),

    /// `Content-Length` is not a non-negative integer.
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    /// The message exceeds the configured size limit.
    #[error("rtsp message too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    /// The stream ended inside a control message.
    #[error("connection closed inside an rtsp message ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    /// The parser returned a message without removing any bytes from the
    /// read buffer, so the stream can no longer advance.
    #[error("message parser returned a message without consuming input")]
    NoProgress,
}

/// Splits one control message off the front of the shared read buffer.
///
/// Implementations must either return `Ok(None)` and leave `src` untouched
/// (more bytes needed), or remove exactly one complete message from the front
/// of `src`. Consuming less or more desynchronizes the stream.
pub trait MessageParser {
    type Message;

    fn parse(&mut self, src: &mut BytesMut) -> Result<Option<Self::Message>, MessageError>;

    /// Cap the size of a single message. Parsers without a limit ignore it.
    fn set_max_message_size(&mut self, _max_message_size: usize) {}
}

/// Run `parser` once and check that a returned message consumed input.
pub(crate) fn parse_one<P: MessageParser>(
    parser: &mut P,
    src: &mut BytesMut,
) -> Result<Option<(P::Message, usize)>, MessageError> {
    let before = src.len();
    let Some(message) = parser.parse(src)? else {
        return Ok(None);
    };
    let consumed = before.saturating_sub(src.len());
    if consumed == 0 {
        return Err(MessageError::NoProgress);
    }
    Ok(Some((message, consumed)))
}

/// A framed RTSP request or response.
#[derive(Clone, PartialEq, Eq)]
pub struct RtspMessage {
    /// Request line (`PLAY rtsp://... RTSP/1.0`) or status line (`RTSP/1.0 200 OK`).
    pub start_line: String,
    /// Headers in wire order.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RtspMessage {
    pub fn new(start_line: impl Into<String>) -> Self {
        Self {
            start_line: start_line.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body. `Content-Length` is derived from it when serializing.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn cseq(&self) -> Option<u32> {
        self.header("CSeq").and_then(|value| value.trim().parse().ok())
    }

    pub fn is_response(&self) -> bool {
        self.start_line.starts_with("RTSP/")
    }

    /// Status code of a response, `None` for requests.
    pub fn status_code(&self) -> Option<u16> {
        if !self.is_response() {
            return None;
        }
        self.start_line.split_whitespace().nth(1)?.parse().ok()
    }

    /// Serialize to wire format.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(128 + self.body.len());
        dst.put_slice(self.start_line.as_bytes());
        dst.put_slice(b"\r\n");
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        if !self.body.is_empty() {
            dst.put_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(&self.body);
        dst.freeze()
    }
}

impl fmt::Debug for RtspMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtspMessage")
            .field("start_line", &self.start_line)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Default [`MessageParser`]: status/request line, headers, optional body.
#[derive(Debug, Clone)]
pub struct RtspMessageParser {
    max_message_size: usize,
}

impl RtspMessageParser {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn too_large(&self, size: usize) -> MessageError {
        MessageError::TooLarge {
            size,
            max: self.max_message_size,
        }
    }
}

impl Default for RtspMessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageParser for RtspMessageParser {
    type Message = RtspMessage;

    fn set_max_message_size(&mut self, max_message_size: usize) {
        self.max_message_size = max_message_size;
    }

    fn parse(&mut self, src: &mut BytesMut) -> Result<Option<RtspMessage>, MessageError> {
        let Some(header_end) = find_header_end(src) else {
            if src.len() > self.max_message_size {
                return Err(self.too_large(src.len()));
            }
            return Ok(None);
        };

        let header_len = header_end + HEADER_TERMINATOR.len();
        if header_len > self.max_message_size {
            return Err(self.too_large(header_len));
        }

        let head = std::str::from_utf8(&src[..header_end]).map_err(|_| MessageError::InvalidUtf8)?;
        let (start_line, headers) = parse_head(head)?;

        let body_len = match headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
        {
            Some((_, value)) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| MessageError::InvalidContentLength(value.clone()))?,
            None => 0,
        };

        let total = header_len
            .checked_add(body_len)
            .ok_or_else(|| self.too_large(usize::MAX))?;
        if total > self.max_message_size {
            return Err(self.too_large(total));
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let body = src.split_to(body_len).freeze();

        Ok(Some(RtspMessage {
            start_line,
            headers,
            body,
        }))
    }
}

fn find_header_end(src: &[u8]) -> Option<usize> {
    src.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

fn parse_head(head: &str) -> Result<(String, Vec<(String, String)>), MessageError> {
    let mut lines = head.split("\r\n");
    let start_line = lines.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(MessageError::InvalidHeader(line.to_string()));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(MessageError::InvalidHeader(line.to_string()));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    Ok((start_line, headers))
}
