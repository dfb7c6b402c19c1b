//! Property-Based Tests for framerec handoffs and timestamps
//!
//! These tests verify invariants of the producer/encoder exchange and of the
//! two stream clocks using proptest for input generation and shrinking.
//!
//! Run with: cargo test --test recording_props

use proptest::prelude::*;
use std::time::{Duration, Instant};

use framerec::handoff::{AudioChunk, AudioQueue, FrameSlot, Handoff, RawFrame, SubmitOutcome};
use framerec::recording::{ColorConverter, VideoEncodeStage};
use framerec::timing::{PacketTimestamp, SampleClock, VideoClock};

fn tagged_frame(tag: u8) -> RawFrame {
    RawFrame::new(vec![tag; 2 * 2 * 4], 2, 2, Instant::now())
}

fn chunk(sequence: u64) -> AudioChunk {
    AudioChunk {
        sequence,
        samples: vec![0.0; 4],
        channels: 2,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FRAME SLOT INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: at most one frame is pending; the newest submission wins
    #[test]
    fn slot_keeps_only_newest_frame(tags in prop::collection::vec(any::<u8>(), 1..50)) {
        let slot = FrameSlot::new();
        slot.open();

        for (i, tag) in tags.iter().enumerate() {
            let outcome = slot.submit(tagged_frame(*tag));
            let expected = if i == 0 { SubmitOutcome::Queued } else { SubmitOutcome::Replaced };
            prop_assert_eq!(outcome, expected);
        }

        prop_assert_eq!(slot.dropped(), tags.len() as u64 - 1);
        let pending = slot.drain();
        prop_assert_eq!(pending.len(), 1);
        prop_assert_eq!(pending[0].data[0], *tags.last().unwrap());
        prop_assert!(slot.drain().is_empty());
    }

    /// INVARIANT: submissions interleaved with takes are never lost or reordered
    #[test]
    fn slot_take_after_each_submit_loses_nothing(tags in prop::collection::vec(any::<u8>(), 1..50)) {
        let slot = FrameSlot::new();
        slot.open();

        for tag in &tags {
            prop_assert_eq!(slot.submit(tagged_frame(*tag)), SubmitOutcome::Queued);
            prop_assert_eq!(slot.take().map(|f| f.data[0]), Some(*tag));
        }
        prop_assert_eq!(slot.dropped(), 0);
    }

    /// INVARIANT: a closed slot rejects everything
    #[test]
    fn closed_slot_rejects(tags in prop::collection::vec(any::<u8>(), 0..20)) {
        let slot = FrameSlot::new();
        slot.open();
        slot.close();
        for tag in tags {
            prop_assert_eq!(slot.submit(tagged_frame(tag)), SubmitOutcome::Rejected);
        }
        prop_assert!(slot.take().is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AUDIO QUEUE INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: FIFO order; when full the oldest chunks are the ones dropped
    #[test]
    fn queue_keeps_newest_in_order(count in 0u64..200, capacity in 1usize..64) {
        let queue = AudioQueue::new(capacity);
        for seq in 0..count {
            prop_assert!(queue.submit(chunk(seq)).is_stored());
        }

        let kept = (count as usize).min(capacity) as u64;
        let drained: Vec<u64> = queue.drain().iter().map(|c| c.sequence).collect();
        let expected: Vec<u64> = (count - kept..count).collect();
        prop_assert_eq!(drained, expected);
        prop_assert_eq!(queue.dropped(), count - kept);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TIMESTAMP INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: the first video packet is at 0 and PTS strictly increase,
    /// even for captures closer together than one tick
    #[test]
    fn video_pts_strictly_increasing(gaps_us in prop::collection::vec(0u64..50_000, 1..100)) {
        let base = Instant::now();
        let mut clock = VideoClock::new(600);
        let mut at = base;

        let first = clock.stamp(at);
        prop_assert_eq!(first, PacketTimestamp::new(0, 600));

        let mut last = first.value;
        for gap in gaps_us {
            at += Duration::from_micros(gap);
            let pts = clock.stamp(at);
            prop_assert!(pts.value > last, "{} did not advance past {}", pts.value, last);
            last = pts.value;
        }
    }

    /// INVARIANT: audio PTS is exactly the samples written before each chunk
    #[test]
    fn audio_pts_counts_samples(frames in prop::sample::select(vec![120u64, 240, 480, 960, 1920, 2880]), chunks in 1usize..100) {
        let mut clock = SampleClock::new(48000);
        for k in 0..chunks {
            let pts = clock.advance(frames);
            prop_assert_eq!(pts.value, k as i64 * frames as i64);
            prop_assert_eq!(pts.timebase, 48000);
        }
        prop_assert_eq!(clock.samples_written(), chunks as u64 * frames);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONVERSION AND ENCODE INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// INVARIANT: output is always one full I420 canvas, whatever the source size
    #[test]
    fn converter_output_matches_canvas(
        canvas_w in (1u32..40).prop_map(|w| w * 2),
        canvas_h in (1u32..40).prop_map(|h| h * 2),
        src_w in 1u32..100,
        src_h in 1u32..100,
        gray in any::<u8>(),
    ) {
        let mut converter = ColorConverter::new(canvas_w, canvas_h).unwrap();
        let rgba = vec![gray; (src_w * src_h * 4) as usize];
        let yuv = converter.convert(&rgba, src_w, src_h).unwrap();

        let y_size = (canvas_w * canvas_h) as usize;
        prop_assert_eq!(yuv.len(), y_size + y_size / 2);
        // Studio swing
        prop_assert!(yuv[..y_size].iter().all(|&y| (16..=235).contains(&y)));
    }

    /// INVARIANT: odd or empty canvases are refused up front
    #[test]
    fn converter_rejects_odd_canvas(w in 0u32..200, h in 0u32..200) {
        prop_assume!(w == 0 || h == 0 || w % 2 == 1 || h % 2 == 1);
        prop_assert!(ColorConverter::new(w, h).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// INVARIANT: the first packet of a session is a keyframe carrying its PTS
    #[test]
    fn first_packet_is_keyframe(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let (w, h) = (64u32, 64u32);
        let mut rgba = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..w * h {
            rgba.extend_from_slice(&[r, g, b, 255]);
        }

        let mut converter = ColorConverter::new(w, h).unwrap();
        let mut stage = VideoEncodeStage::new(w, h, 30).unwrap();
        let yuv = converter.convert(&rgba, w, h).unwrap();

        let packet = stage
            .encode(yuv, PacketTimestamp::new(0, 600))
            .unwrap()
            .expect("first frame produces a packet");
        prop_assert!(packet.is_keyframe);
        prop_assert_eq!(packet.pts.value, 0);
        prop_assert!(packet.dts.is_none());
    }
}
