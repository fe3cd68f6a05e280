//! Channel assignment for interleaved tracks.
//!
//! Each track set up in interleaved mode owns two channels: one for RTP and
//! one for RTCP. The server confirms the pair in its SETUP response, usually
//! `(2n, 2n + 1)` for track `n`, but any unique pair is valid.

use std::collections::BTreeMap;
use std::fmt;

/// Which sub-stream of a track a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Rtp,
    Rtcp,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Rtp => "rtp",
            ChannelKind::Rtcp => "rtcp",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a channel leads: a track index and the sub-stream on that track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRoute {
    pub track: usize,
    pub kind: ChannelKind,
}

/// Errors raised while building a [`ChannelAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    /// The channel already belongs to another track or sub-stream.
    #[error("channel {channel} already assigned to track {track} ({kind})")]
    ChannelInUse {
        channel: u8,
        track: usize,
        kind: ChannelKind,
    },

    /// RTP and RTCP were given the same channel.
    #[error("track {track}: RTP and RTCP cannot share channel {channel}")]
    SameChannel { track: usize, channel: u8 },

    /// The track already has a channel pair.
    #[error("track {0} already has a channel pair")]
    TrackAssigned(usize),
}

/// Resolves a channel number to its route.
pub trait ChannelLookup {
    fn lookup(&self, channel: u8) -> Option<ChannelRoute>;
}

/// Bidirectional track ↔ channel-pair mapping for one session.
#[derive(Clone)]
pub struct ChannelAssignment {
    routes: [Option<ChannelRoute>; 256],
    tracks: BTreeMap<usize, (u8, u8)>,
}

impl ChannelAssignment {
    /// An empty assignment: every channel is unknown.
    pub fn new() -> Self {
        Self {
            routes: [None; 256],
            tracks: BTreeMap::new(),
        }
    }

    /// The customary `(2n, 2n + 1)` layout for tracks `0..track_count`.
    ///
    /// At most 128 tracks fit in the channel space; extra tracks are ignored.
    pub fn conventional(track_count: usize) -> Self {
        let mut assignment = Self::new();
        for track in 0..track_count.min(128) {
            let rtp = (track * 2) as u8;
            // Fresh assignment with disjoint pairs, cannot conflict.
            let _ = assignment.assign(track, rtp, rtp + 1);
        }
        assignment
    }

    /// Record the channel pair negotiated for `track`.
    pub fn assign(&mut self, track: usize, rtp: u8, rtcp: u8) -> Result<(), AssignmentError> {
        if rtp == rtcp {
            return Err(AssignmentError::SameChannel {
                track,
                channel: rtp,
            });
        }
        if self.tracks.contains_key(&track) {
            return Err(AssignmentError::TrackAssigned(track));
        }
        for channel in [rtp, rtcp] {
            if let Some(existing) = self.routes[channel as usize] {
                return Err(AssignmentError::ChannelInUse {
                    channel,
                    track: existing.track,
                    kind: existing.kind,
                });
            }
        }

        self.routes[rtp as usize] = Some(ChannelRoute {
            track,
            kind: ChannelKind::Rtp,
        });
        self.routes[rtcp as usize] = Some(ChannelRoute {
            track,
            kind: ChannelKind::Rtcp,
        });
        self.tracks.insert(track, (rtp, rtcp));
        Ok(())
    }

    /// Builder-style [`ChannelAssignment::assign`].
    pub fn with_track(mut self, track: usize, rtp: u8, rtcp: u8) -> Result<Self, AssignmentError> {
        self.assign(track, rtp, rtcp)?;
        Ok(self)
    }

    /// The route of `channel`, if it was assigned.
    pub fn lookup(&self, channel: u8) -> Option<ChannelRoute> {
        self.routes[channel as usize]
    }

    /// The `(rtp, rtcp)` channel pair of `track`.
    pub fn channels_for(&self, track: usize) -> Option<(u8, u8)> {
        self.tracks.get(&track).copied()
    }

    /// The channel carrying `kind` for `track`.
    pub fn channel(&self, track: usize, kind: ChannelKind) -> Option<u8> {
        self.channels_for(track).map(|(rtp, rtcp)| match kind {
            ChannelKind::Rtp => rtp,
            ChannelKind::Rtcp => rtcp,
        })
    }

    /// Assigned tracks in ascending order, with their channel pairs.
    pub fn tracks(&self) -> impl Iterator<Item = (usize, (u8, u8))> + '_ {
        self.tracks.iter().map(|(track, pair)| (*track, *pair))
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for ChannelAssignment {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLookup for ChannelAssignment {
    fn lookup(&self, channel: u8) -> Option<ChannelRoute> {
        ChannelAssignment::lookup(self, channel)
    }
}

impl fmt::Debug for ChannelAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.tracks.iter()).finish()
    }
}
