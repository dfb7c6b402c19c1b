//! Producer-to-encoder handoffs
//!
//! Two bounded resources move raw media from capture threads to the encoder
//! thread:
//! - `FrameSlot`: single-slot exchange for video, the newest frame overwrites
//!   an unconsumed one
//! - `AudioQueue`: capacity-limited FIFO for audio chunks, the oldest chunk
//!   is dropped when full
//!
//! Both implement [`Handoff`] so they can be driven the same way.

mod audio_queue;
mod frame_slot;

pub use audio_queue::{AudioChunk, AudioQueue};
pub use frame_slot::{FrameSlot, RawFrame};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// What happened to a submitted item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored, nothing was displaced
    Queued,
    /// Stored, an older unconsumed item was dropped to make room
    Replaced,
    /// Not stored: the handoff is closed or the item was malformed
    Rejected,
}

impl SubmitOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, SubmitOutcome::Rejected)
    }
}

/// Common submit/take shape of the video and audio handoffs
pub trait Handoff {
    type Item;

    /// Non-blocking submission from a producer thread
    fn submit(&self, item: Self::Item) -> SubmitOutcome;

    /// Take everything pending, oldest first, without blocking
    fn drain(&self) -> Vec<Self::Item>;

    /// Stop accepting submissions and wake any waiting consumer
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Items displaced before they were consumed
    fn dropped(&self) -> u64;
}

/// A panicking producer must not wedge the encoder, so poisoning is ignored:
/// every critical section leaves the guarded state consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
