//! Channel-to-track routing.
//!
//! # Backpressure
//!
//! Consumers are called synchronously on the read loop. While one runs, no
//! other frame or control message on the connection is read, so
//! [`TrackConsumer::deliver`] must return quickly and never block. Consumers
//! that need to do real work should sit behind a [`QueuedConsumer`], which hands
//! packets to a bounded queue and drops them (counting and logging each drop)
//! when the queue is full.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use bytes::Bytes;
use rtspmux_frame::{ChannelAssignment, ChannelKind, ChannelLookup, ChannelRoute, InterleavedFrame};
use tracing::{trace, warn};

use crate::error::{Result, SessionError};

/// Receives the RTP and RTCP payloads of one track.
pub trait TrackConsumer {
    /// Called on the read loop for every frame routed to this track.
    ///
    /// Must not block.
    fn deliver(&mut self, payload: Bytes, kind: ChannelKind);
}

impl<F> TrackConsumer for F
where
    F: FnMut(Bytes, ChannelKind),
{
    fn deliver(&mut self, payload: Bytes, kind: ChannelKind) {
        self(payload, kind)
    }
}

/// A payload handed off through a [`QueuedConsumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPacket {
    pub track: usize,
    pub kind: ChannelKind,
    pub payload: Bytes,
}

/// Non-blocking hand-off to a bounded queue.
///
/// When the queue is full, or its receiver is gone, the packet is dropped.
pub struct QueuedConsumer {
    track: usize,
    tx: SyncSender<TrackPacket>,
    dropped: Arc<AtomicU64>,
}

impl QueuedConsumer {
    /// Create a consumer for `track` and the receiving end of its queue.
    pub fn bounded(track: usize, capacity: usize) -> (Self, Receiver<TrackPacket>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(capacity);
        (Self::from_sender(track, tx), rx)
    }

    /// Feed an existing queue, e.g. one shared by several tracks.
    pub fn from_sender(track: usize, tx: SyncSender<TrackPacket>) -> Self {
        Self {
            track,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of packets dropped so far.
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TrackConsumer for QueuedConsumer {
    fn deliver(&mut self, payload: Bytes, kind: ChannelKind) {
        let packet = TrackPacket {
            track: self.track,
            kind,
            payload,
        };
        match self.tx.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(packet)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    track = packet.track,
                    kind = %packet.kind,
                    len = packet.payload.len(),
                    dropped,
                    "track queue full, dropping packet"
                );
            }
            Err(TrySendError::Disconnected(packet)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(track = packet.track, dropped, "track queue closed, dropping packet");
            }
        }
    }
}

/// Routes decoded frames to per-track consumers.
pub struct ChannelRouter<L = ChannelAssignment> {
    lookup: L,
    consumers: BTreeMap<usize, Box<dyn TrackConsumer + Send>>,
}

impl<L: ChannelLookup> ChannelRouter<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            consumers: BTreeMap::new(),
        }
    }

    /// Install the consumer for `track`, replacing any previous one.
    pub fn register(&mut self, track: usize, consumer: impl TrackConsumer + Send + 'static) {
        self.consumers.insert(track, Box::new(consumer));
    }

    /// Builder-style [`ChannelRouter::register`].
    pub fn with_consumer(mut self, track: usize, consumer: impl TrackConsumer + Send + 'static) -> Self {
        self.register(track, consumer);
        self
    }

    /// Remove the consumer for `track`. Later frames for it are reported as
    /// [`SessionError::NoConsumer`].
    pub fn unregister(&mut self, track: usize) -> bool {
        self.consumers.remove(&track).is_some()
    }

    /// Resolve a channel without delivering anything.
    pub fn resolve(&self, channel: u8) -> Result<ChannelRoute> {
        self.lookup
            .lookup(channel)
            .ok_or(SessionError::UnknownChannel { channel })
    }

    /// Deliver `frame`'s payload to the consumer of its track.
    pub fn route(&mut self, frame: InterleavedFrame) -> Result<ChannelRoute> {
        let channel = frame.channel();
        let route = self.resolve(channel)?;
        let consumer = self
            .consumers
            .get_mut(&route.track)
            .ok_or(SessionError::NoConsumer {
                channel,
                track: route.track,
            })?;

        trace!(
            channel,
            track = route.track,
            kind = %route.kind,
            len = frame.payload_len(),
            "routing frame"
        );
        consumer.deliver(frame.into_payload(), route.kind);
        Ok(route)
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<(usize, ChannelKind, Vec<u8>)>>>;

    fn recording(track: usize, log: &Log) -> impl TrackConsumer + Send + 'static {
        let log = Arc::clone(log);
        move |payload: Bytes, kind: ChannelKind| {
            log.lock().unwrap().push((track, kind, payload.to_vec()));
        }
    }

    fn frame(channel: u8, payload: &'static [u8]) -> InterleavedFrame {
        InterleavedFrame::new(channel, payload).unwrap()
    }

    #[test]
    fn routes_rtp_and_rtcp_to_track() {
        let log: Log = Arc::default();
        let mut router = ChannelRouter::new(ChannelAssignment::conventional(2))
            .with_consumer(0, recording(0, &log))
            .with_consumer(1, recording(1, &log));

        router.route(frame(0, b"v-rtp")).unwrap();
        router.route(frame(3, b"a-rtcp")).unwrap();
        router.route(frame(1, b"v-rtcp")).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (0, ChannelKind::Rtp, b"v-rtp".to_vec()),
                (1, ChannelKind::Rtcp, b"a-rtcp".to_vec()),
                (0, ChannelKind::Rtcp, b"v-rtcp".to_vec()),
            ]
        );
    }

    #[test]
    fn honors_negotiated_channels() {
        let log: Log = Arc::default();
        let assignment = ChannelAssignment::new().with_track(0, 6, 7).unwrap();
        let mut router = ChannelRouter::new(assignment).with_consumer(0, recording(0, &log));

        let route = router.route(frame(7, b"sr")).unwrap();
        assert_eq!(
            route,
            ChannelRoute {
                track: 0,
                kind: ChannelKind::Rtcp
            }
        );
        assert!(matches!(
            router.route(frame(0, b"x")),
            Err(SessionError::UnknownChannel { channel: 0 })
        ));
    }

    #[test]
    fn unknown_channel_is_reported() {
        let log: Log = Arc::default();
        let mut router =
            ChannelRouter::new(ChannelAssignment::conventional(1)).with_consumer(0, recording(0, &log));

        let err = router.route(frame(42, b"stray")).unwrap_err();
        assert!(matches!(err, SessionError::UnknownChannel { channel: 42 }));
        assert!(!err.is_fatal());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_consumer_is_reported() {
        let mut router = ChannelRouter::new(ChannelAssignment::conventional(2));
        let err = router.route(frame(2, b"audio")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::NoConsumer {
                channel: 2,
                track: 1
            }
        ));
    }

    #[test]
    fn routing_is_deterministic() {
        let router = ChannelRouter::new(ChannelAssignment::conventional(3));
        for channel in 0..=u8::MAX {
            let first = router.resolve(channel).ok();
            for _ in 0..3 {
                assert_eq!(router.resolve(channel).ok(), first);
            }
        }
    }

    #[test]
    fn unregister_stops_delivery() {
        let log: Log = Arc::default();
        let mut router =
            ChannelRouter::new(ChannelAssignment::conventional(1)).with_consumer(0, recording(0, &log));

        assert!(router.unregister(0));
        assert!(!router.unregister(0));
        assert!(matches!(
            router.route(frame(0, b"x")),
            Err(SessionError::NoConsumer { .. })
        ));
    }

    #[test]
    fn queued_consumer_hands_off() {
        let (consumer, rx) = QueuedConsumer::bounded(1, 4);
        let mut router =
            ChannelRouter::new(ChannelAssignment::conventional(2)).with_consumer(1, consumer);

        router.route(frame(2, b"one")).unwrap();
        router.route(frame(3, b"two")).unwrap();

        let first = rx.recv().unwrap();
        assert_eq!(first.track, 1);
        assert_eq!(first.kind, ChannelKind::Rtp);
        assert_eq!(first.payload.as_ref(), b"one");
        assert_eq!(rx.recv().unwrap().kind, ChannelKind::Rtcp);
    }

    #[test]
    fn queued_consumer_drops_when_full() {
        let (mut consumer, rx) = QueuedConsumer::bounded(0, 1);
        let counter = consumer.drop_counter();

        consumer.deliver(Bytes::from_static(b"kept"), ChannelKind::Rtp);
        consumer.deliver(Bytes::from_static(b"dropped"), ChannelKind::Rtp);
        consumer.deliver(Bytes::from_static(b"dropped"), ChannelKind::Rtcp);

        assert_eq!(consumer.dropped(), 2);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        assert_eq!(rx.try_recv().unwrap().payload.as_ref(), b"kept");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn queued_consumer_drops_after_receiver_gone() {
        let (mut consumer, rx) = QueuedConsumer::bounded(0, 1);
        drop(rx);

        consumer.deliver(Bytes::from_static(b"late"), ChannelKind::Rtp);
        assert_eq!(consumer.dropped(), 1);
    }
}
