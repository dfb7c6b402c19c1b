//! Capacity-limited FIFO of captured audio chunks

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{lock, Handoff, SubmitOutcome};

/// One fixed-length block of interleaved f32 samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Arrival order, starting at 0 for the first chunk of a session
    pub sequence: u64,
    /// Interleaved samples, `frames * channels` long
    pub samples: Vec<f32>,
    pub channels: u16,
}

impl AudioChunk {
    /// Samples per channel
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

struct QueueInner {
    items: VecDeque<AudioChunk>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

/// FIFO between the audio capture thread and the encoder thread.
///
/// Order is preserved end to end. When the encoder stalls long enough to fill
/// the queue the oldest chunk is dropped, bounding memory the same way the
/// video slot does.
pub struct AudioQueue {
    inner: Mutex<QueueInner>,
}

impl AudioQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                dropped: 0,
                closed: false,
            }),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        lock(&self.inner).capacity
    }
}

impl Handoff for AudioQueue {
    type Item = AudioChunk;

    fn submit(&self, chunk: AudioChunk) -> SubmitOutcome {
        let mut g = lock(&self.inner);
        if g.closed {
            return SubmitOutcome::Rejected;
        }

        let outcome = if g.items.len() >= g.capacity {
            g.items.pop_front();
            g.dropped = g.dropped.saturating_add(1);
            SubmitOutcome::Replaced
        } else {
            SubmitOutcome::Queued
        };
        g.items.push_back(chunk);
        outcome
    }

    fn drain(&self) -> Vec<AudioChunk> {
        lock(&self.inner).items.drain(..).collect()
    }

    fn close(&self) {
        lock(&self.inner).closed = true;
    }

    fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    fn dropped(&self) -> u64 {
        lock(&self.inner).dropped
    }
}
