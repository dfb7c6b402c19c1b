//! Single-slot video frame exchange

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::{lock, Handoff, SubmitOutcome};

/// A captured framebuffer as handed over by the producer.
///
/// `data` is bottom-up RGBA, `width * height * 4` bytes.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, captured_at: Instant) -> Self {
        Self {
            data,
            width,
            height,
            captured_at,
        }
    }

    /// Dimensions are non-zero and the buffer holds a full RGBA image
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() >= self.width as usize * self.height as usize * 4
    }
}

struct SlotState {
    frame: Option<RawFrame>,
    closed: bool,
}

/// Holds at most one pending frame.
///
/// `accepting` (can anything be submitted) and `pending` (is there an
/// unconsumed frame) are tracked separately so the producer's cheap
/// [`FrameSlot::is_ready`] check never races with the consumer flipping a
/// shared flag. Both atomics mirror state owned by the mutex.
pub struct FrameSlot {
    state: Mutex<SlotState>,
    cv: Condvar,
    accepting: AtomicBool,
    pending: AtomicBool,
    dropped: AtomicU64,
}

impl FrameSlot {
    /// A slot that rejects submissions until [`FrameSlot::open`] is called
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                frame: None,
                closed: false,
            }),
            cv: Condvar::new(),
            accepting: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Start accepting frames. Has no effect once closed.
    pub fn open(&self) {
        let g = lock(&self.state);
        if !g.closed {
            self.accepting.store(true, Ordering::Release);
        }
    }

    /// Advisory: the slot is accepting and has no unconsumed frame.
    ///
    /// A producer may skip expensive readback when this is false; the answer
    /// can change the instant after the check.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.accepting.load(Ordering::Acquire) && !self.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until a frame is available or the slot is closed.
    ///
    /// A frame still pending at close is returned before `None`, so nothing
    /// submitted ahead of a stop request is lost.
    pub fn take(&self) -> Option<RawFrame> {
        let mut g = lock(&self.state);
        loop {
            if let Some(frame) = g.frame.take() {
                self.pending.store(false, Ordering::Release);
                return Some(frame);
            }
            if g.closed {
                return None;
            }
            g = self.cv.wait(g).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`FrameSlot::take`] but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Option<RawFrame> {
        let deadline = Instant::now() + timeout;
        let mut g = lock(&self.state);
        loop {
            if let Some(frame) = g.frame.take() {
                self.pending.store(false, Ordering::Release);
                return Some(frame);
            }
            if g.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (ng, _) = self
                .cv
                .wait_timeout(g, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            g = ng;
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Handoff for FrameSlot {
    type Item = RawFrame;

    fn submit(&self, frame: RawFrame) -> SubmitOutcome {
        if !self.accepting.load(Ordering::Acquire) {
            return SubmitOutcome::Rejected;
        }

        let mut g = lock(&self.state);
        if g.closed {
            return SubmitOutcome::Rejected;
        }

        let outcome = if g.frame.replace(frame).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            SubmitOutcome::Replaced
        } else {
            SubmitOutcome::Queued
        };
        self.pending.store(true, Ordering::Release);
        self.cv.notify_one();
        outcome
    }

    fn drain(&self) -> Vec<RawFrame> {
        let mut g = lock(&self.state);
        let frame = g.frame.take();
        self.pending.store(false, Ordering::Release);
        frame.into_iter().collect()
    }

    fn close(&self) {
        let mut g = lock(&self.state);
        g.closed = true;
        self.accepting.store(false, Ordering::Release);
        self.cv.notify_all();
    }

    fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
