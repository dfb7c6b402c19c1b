//! Presentation timestamps for the video and audio streams
//!
//! Each stream keeps its own timebase. Video timestamps come from capture
//! instants relative to the session epoch; audio timestamps come from a
//! sample counter. Ordering across the two streams is left to the container.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A timestamp expressed in ticks of a stream-specific timebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketTimestamp {
    /// Tick count
    pub value: i64,
    /// Ticks per second
    pub timebase: u32,
}

impl PacketTimestamp {
    pub fn new(value: i64, timebase: u32) -> Self {
        Self { value, timebase }
    }

    /// Timestamp in seconds, as the MP4 muxer consumes it
    #[inline]
    pub fn as_secs(&self) -> f64 {
        self.value as f64 / self.timebase as f64
    }
}

/// Derives video timestamps from capture instants.
///
/// The epoch is the capture instant of the first stamped frame, so the first
/// video packet of a session always lands on tick 0. Stamps are strictly
/// increasing: two captures that round to the same tick are spread one tick
/// apart, and a capture instant older than its predecessor never moves the
/// stream backwards.
#[derive(Debug, Clone)]
pub struct VideoClock {
    timebase: u32,
    epoch: Option<Instant>,
    last: Option<i64>,
}

impl VideoClock {
    pub fn new(timebase: u32) -> Self {
        Self {
            timebase,
            epoch: None,
            last: None,
        }
    }

    /// Start the timeline at an explicit instant instead of the first frame
    pub fn with_epoch(timebase: u32, epoch: Instant) -> Self {
        Self {
            timebase,
            epoch: Some(epoch),
            last: None,
        }
    }

    pub fn stamp(&mut self, captured_at: Instant) -> PacketTimestamp {
        let epoch = *self.epoch.get_or_insert(captured_at);
        let elapsed = captured_at.saturating_duration_since(epoch).as_secs_f64();
        let mut ticks = (elapsed * self.timebase as f64).floor() as i64;

        if let Some(last) = self.last {
            if ticks <= last {
                ticks = last + 1;
            }
        }
        self.last = Some(ticks);

        PacketTimestamp::new(ticks, self.timebase)
    }

    pub fn epoch(&self) -> Option<Instant> {
        self.epoch
    }

    pub fn timebase(&self) -> u32 {
        self.timebase
    }
}

/// Derives audio timestamps from the number of samples already written.
#[derive(Debug, Clone)]
pub struct SampleClock {
    sample_rate: u32,
    samples_written: u64,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples_written: 0,
        }
    }

    /// Timestamp of a chunk of `frames` samples per channel, then advance
    /// the counter past it. Advances exactly once per chunk.
    pub fn advance(&mut self, frames: u64) -> PacketTimestamp {
        let pts = PacketTimestamp::new(self.samples_written as i64, self.sample_rate);
        self.samples_written += frames;
        pts
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}
