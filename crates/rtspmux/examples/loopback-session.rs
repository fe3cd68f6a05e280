//! Interleaved session over a loopback TCP connection.
//!
//! A fake server thread answers with an RTSP response followed by RTP and
//! RTCP frames for two tracks. The client routes each track to its own queue
//! and sends an RTCP receiver report back through the shared writer.
//!
//! Run with:
//!   cargo run --example loopback-session

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;

use rtspmux::frame::{ChannelAssignment, ChannelKind, FrameReader, InterleavedFrame};
use rtspmux::session::{
    ChannelRouter, InterleavedSession, QueuedConsumer, RtspMessageParser, SessionConfig,
    StreamDemultiplexer, Unit,
};
use rtspmux::transport::RtspStream;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = thread::spawn(move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (mut conn, _) = listener.accept()?;
        conn.write_all(b"RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: 42\r\n\r\n")?;
        for seq in 0..4u8 {
            conn.write_all(&InterleavedFrame::new(0, vec![0x80, 0x60, 0x00, seq])?.marshal())?;
            conn.write_all(&InterleavedFrame::new(2, vec![0x80, 0x61, 0x00, seq])?.marshal())?;
        }
        conn.write_all(&InterleavedFrame::new(1, &b"sender report"[..])?.marshal())?;

        // Wait for the client's receiver report, then hang up.
        let mut demux =
            StreamDemultiplexer::new(FrameReader::new(conn.try_clone()?), RtspMessageParser::new());
        if let Unit::Frame(frame) = demux.next_unit()? {
            eprintln!("server: got {} bytes on channel {}", frame.payload_len(), frame.channel());
        }
        Ok(())
    });

    let (video, video_rx) = QueuedConsumer::bounded(0, 64);
    let (audio, audio_rx) = QueuedConsumer::bounded(1, 64);
    let assignment = ChannelAssignment::conventional(2);
    let rtcp_channel = assignment.channel(0, ChannelKind::Rtcp).unwrap_or(1);
    let router = ChannelRouter::new(assignment)
        .with_consumer(0, video)
        .with_consumer(1, audio);

    let stream = RtspStream::from(TcpStream::connect(addr)?);
    let mut session = InterleavedSession::from_stream(
        stream,
        RtspMessageParser::new(),
        router,
        SessionConfig::default(),
    )?;

    let writer = session.writer();
    session.run(|message| {
        eprintln!("client: {} (CSeq {:?})", message.start_line, message.cseq());
        if let Err(err) = writer.write_frame(rtcp_channel, b"receiver report") {
            eprintln!("client: write failed: {err}");
        }
    })?;

    server
        .join()
        .map_err(|_| "server thread panicked")?
        .map_err(|err| err.to_string())?;

    for packet in video_rx.try_iter().chain(audio_rx.try_iter()) {
        eprintln!(
            "track {} {}: {} bytes",
            packet.track,
            packet.kind,
            packet.payload.len()
        );
    }
    eprintln!("stats: {:?}", session.stats());
    Ok(())
}
