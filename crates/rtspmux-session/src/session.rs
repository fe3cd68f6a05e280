use std::io::{Read, Write};

use rtspmux_frame::{ChannelAssignment, ChannelLookup, ChannelRoute, FrameReader, FrameWriter};
use rtspmux_transport::RtspStream;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::demux::{StreamDemultiplexer, Unit};
use crate::error::Result;
use crate::message::MessageParser;
use crate::router::ChannelRouter;
use crate::writer::SessionWriter;

/// Outcome of one [`InterleavedSession::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<M> {
    /// An RTSP control message, handed back to the caller.
    Message(M),
    /// A frame delivered to its track consumer.
    Routed(ChannelRoute),
    /// A frame dropped because its channel has no assigned track or its track
    /// has no consumer.
    Discarded { channel: u8 },
}

/// Counters kept by the read loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub messages: u64,
    pub frames_routed: u64,
    pub frames_discarded: u64,
}

/// Shuts the session's connection down from another thread.
///
/// The blocked read on the session fails once the stream is closed, which ends
/// [`InterleavedSession::run`].
#[derive(Debug)]
pub struct SessionCloser {
    stream: RtspStream,
}

impl SessionCloser {
    pub fn close(&self) -> Result<()> {
        self.stream.shutdown()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_shut_down()
    }
}

/// One RTSP connection carrying control messages and interleaved media.
///
/// The session owns the only read cursor. Writes go through
/// [`InterleavedSession::writer`] clones, usable from any thread.
pub struct InterleavedSession<R, W, P, L = ChannelAssignment> {
    demux: StreamDemultiplexer<R, P>,
    router: ChannelRouter<L>,
    writer: SessionWriter<W>,
    stats: SessionStats,
}

impl<R, W, P, L> InterleavedSession<R, W, P, L>
where
    R: Read,
    W: Write,
    P: MessageParser,
    L: ChannelLookup,
{
    /// Build a session over an arbitrary read/write pair.
    ///
    /// `config.max_message_size` replaces any limit already set on `parser`.
    /// Deadlines in `config` cannot be applied to generic streams; use
    /// [`InterleavedSession::from_stream`] for sockets.
    pub fn new(reader: R, writer: W, parser: P, router: ChannelRouter<L>, config: SessionConfig) -> Self {
        let max_message_size = config.max_message_size;
        let reader = FrameReader::with_config(reader, config.frame.clone());
        let writer = FrameWriter::with_config(writer, config.frame);
        Self::from_parts(reader, writer, parser, router, max_message_size)
    }

    fn from_parts(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        mut parser: P,
        router: ChannelRouter<L>,
        max_message_size: usize,
    ) -> Self {
        parser.set_max_message_size(max_message_size);
        Self {
            demux: StreamDemultiplexer::new(reader, parser),
            router,
            writer: SessionWriter::new(writer),
            stats: SessionStats::default(),
        }
    }

    /// A writer sharing this session's connection and lock.
    pub fn writer(&self) -> SessionWriter<W> {
        self.writer.clone()
    }

    /// Read one unit and dispatch it.
    ///
    /// Routing failures are absorbed as [`Event::Discarded`]; any error
    /// returned from here is fatal for the connection.
    pub fn step(&mut self) -> Result<Event<P::Message>> {
        match self.demux.next_unit()? {
            Unit::Message(message) => {
                self.stats.messages += 1;
                Ok(Event::Message(message))
            }
            Unit::Frame(frame) => {
                let channel = frame.channel();
                match self.router.route(frame) {
                    Ok(route) => {
                        self.stats.frames_routed += 1;
                        Ok(Event::Routed(route))
                    }
                    Err(err) if !err.is_fatal() => {
                        self.stats.frames_discarded += 1;
                        warn!(
                            channel,
                            discarded = self.stats.frames_discarded,
                            error = %err,
                            "discarding interleaved frame"
                        );
                        Ok(Event::Discarded { channel })
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Drive the read loop until the connection ends.
    ///
    /// `on_message` sees every control message. A clean close between units
    /// returns `Ok(())`; any other fatal error is returned as is.
    pub fn run(&mut self, mut on_message: impl FnMut(P::Message)) -> Result<()> {
        info!("interleaved session started");
        let outcome = loop {
            match self.step() {
                Ok(Event::Message(message)) => on_message(message),
                Ok(Event::Routed(_)) | Ok(Event::Discarded { .. }) => {}
                Err(err) if err.is_closed() => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        match &outcome {
            Ok(()) => info!(
                messages = self.stats.messages,
                frames_routed = self.stats.frames_routed,
                frames_discarded = self.stats.frames_discarded,
                "interleaved session closed"
            ),
            Err(err) => warn!(
                messages = self.stats.messages,
                frames_routed = self.stats.frames_routed,
                frames_discarded = self.stats.frames_discarded,
                error = %err,
                "interleaved session failed"
            ),
        }
        outcome
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn router(&self) -> &ChannelRouter<L> {
        &self.router
    }

    /// Register or replace consumers while the session is paused between steps.
    pub fn router_mut(&mut self) -> &mut ChannelRouter<L> {
        &mut self.router
    }
}

impl<P, L> InterleavedSession<RtspStream, RtspStream, P, L>
where
    P: MessageParser,
    L: ChannelLookup,
{
    /// Build a session over a connected socket.
    ///
    /// The stream is split with `try_clone` and the configured deadlines are
    /// applied to it. The message size limit is applied as in
    /// [`InterleavedSession::new`].
    pub fn from_stream(
        stream: RtspStream,
        parser: P,
        router: ChannelRouter<L>,
        config: SessionConfig,
    ) -> Result<Self> {
        let max_message_size = config.max_message_size;
        let write_half = stream.try_clone()?;
        let reader = FrameReader::with_config_stream(stream, config.frame.clone())?;
        let writer = FrameWriter::with_config_stream(write_half, config.frame)?;
        debug!(peer = ?reader.get_ref().peer_addr(), "interleaved session bound to stream");
        Ok(Self::from_parts(reader, writer, parser, router, max_message_size))
    }

    /// A handle that closes this session's connection.
    pub fn closer(&self) -> Result<SessionCloser> {
        let stream = self.demux.reader().get_ref().try_clone()?;
        Ok(SessionCloser { stream })
    }
}
