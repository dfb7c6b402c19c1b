//! Audio-Video Integration Tests for framerec
//!
//! Sessions with a synthetic audio source: FIFO audio timestamps, degraded
//! (video-only) sessions when the audio source or codec cannot be used, and a
//! real MP4 with both tracks.
//!
//! Run with: cargo test --test av_integration

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;

use framerec::config::RecorderConfig;
use framerec::recording::{Recorder, SessionHandle, StreamId};
use framerec::testing::{
    synthetic_video_frame, CollectingSink, FailingAudioSource, SinkLog, SyntheticAudioSource,
};

const W: u32 = 160;
const H: u32 = 120;

/// Submit `count` frames roughly 40ms apart, waiting for each to be encoded
fn feed_frames(session: &SessionHandle, count: u64) {
    let t0 = Instant::now();
    for i in 0..count {
        let captured_at = t0 + Duration::from_millis(i * 40);
        session.submit_frame(synthetic_video_frame(i, W, H), W, H, captured_at);

        let deadline = Instant::now() + Duration::from_secs(10);
        while session.frames_encoded() < i + 1 {
            assert!(Instant::now() < deadline, "encoder did not catch up");
            std::thread::sleep(Duration::from_millis(2));
        }
        std::thread::sleep(Duration::from_millis(40));
    }
}

fn audio_pts(log: &Arc<Mutex<SinkLog>>) -> Vec<i64> {
    log.lock()
        .unwrap()
        .packets
        .iter()
        .filter(|p| p.stream == StreamId::Audio)
        .map(|p| p.pts.value)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// AUDIO TIMELINE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_audio_packets_follow_sample_counter() {
    let (opener, log) = CollectingSink::opener();
    let recorder = Recorder::new(RecorderConfig::default())
        .with_audio_source(SyntheticAudioSource::factory(48000, 2))
        .with_sink(opener);

    let session = recorder.start("av.mp4", W, H).expect("start");
    feed_frames(&session, 10);
    let stats = session.stop().expect("stop");

    assert!(stats.audio_recorded);
    assert!(stats.audio_error.is_none());
    assert!(stats.audio_packets > 0, "400ms of capture yields audio");

    let layout = log.lock().unwrap().layout.clone().unwrap();
    let audio = layout.audio.expect("audio track declared");
    assert_eq!((audio.sample_rate, audio.channels), (48000, 2));

    let pts = audio_pts(&log);
    let expected: Vec<i64> = (0..pts.len() as i64).map(|k| k * 960).collect();
    assert_eq!(pts, expected);
    assert_eq!(pts.len() as u64, stats.audio_packets);
}

#[test]
fn test_audio_disabled_ignores_source() {
    let (opener, log) = CollectingSink::opener();
    let recorder = Recorder::new(RecorderConfig::video_only())
        .with_audio_source(SyntheticAudioSource::factory(48000, 2))
        .with_sink(opener);

    let session = recorder.start("video.mp4", W, H).expect("start");
    feed_frames(&session, 3);
    let stats = session.stop().expect("stop");

    assert!(!stats.audio_recorded);
    assert!(stats.audio_error.is_none());
    assert!(log.lock().unwrap().layout.as_ref().unwrap().audio.is_none());
    assert!(audio_pts(&log).is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// DEGRADED SESSIONS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_unsupported_sample_rate_degrades_to_video() {
    let mut config = RecorderConfig::default();
    config.audio.sample_rate = 44100;

    let (opener, log) = CollectingSink::opener();
    let recorder = Recorder::new(config)
        .with_audio_source(SyntheticAudioSource::factory(44100, 2))
        .with_sink(opener);

    let session = recorder.start("degraded.mp4", W, H).expect("video still starts");
    feed_frames(&session, 5);
    let stats = session.stop().expect("stop");

    assert_eq!(stats.video_packets, 5);
    assert_eq!(stats.audio_packets, 0);
    assert!(!stats.audio_recorded);
    assert!(stats.audio_error.is_some());
    assert!(log.lock().unwrap().layout.as_ref().unwrap().audio.is_none());
}

#[test]
fn test_missing_audio_device_degrades_to_video() {
    let (opener, log) = CollectingSink::opener();
    let recorder = Recorder::new(RecorderConfig::default())
        .with_audio_source(FailingAudioSource::unavailable())
        .with_sink(opener);

    let session = recorder.start("nodevice.mp4", W, H).expect("video still starts");
    feed_frames(&session, 3);
    let stats = session.stop().expect("stop");

    assert_eq!(stats.video_packets, 3);
    assert!(!stats.audio_recorded);
    assert!(stats
        .audio_error
        .as_deref()
        .unwrap_or_default()
        .contains("No audio device"));
    assert!(log.lock().unwrap().layout.as_ref().unwrap().audio.is_none());
}

#[test]
fn test_audio_failure_mid_session_keeps_video() {
    let (opener, log) = CollectingSink::opener();
    let recorder = Recorder::new(RecorderConfig::default())
        .with_audio_source(FailingAudioSource::factory(5))
        .with_sink(opener);

    let session = recorder.start("midfail.mp4", W, H).expect("start");
    feed_frames(&session, 8);
    let stats = session.stop().expect("a failed microphone is not fatal");

    assert_eq!(stats.video_packets, 8);
    assert!(stats.audio_recorded);
    assert!(stats.audio_error.is_some());
    // Chunks read before the first frame are discarded, the rest are muxed
    assert_eq!(stats.audio_packets + stats.dropped_audio_chunks, 5);

    let pts = audio_pts(&log);
    let expected: Vec<i64> = (0..stats.audio_packets as i64).map(|k| k * 960).collect();
    assert_eq!(pts, expected);
}

#[test]
fn test_audio_before_first_frame_is_discarded() {
    let (opener, log) = CollectingSink::opener();
    let recorder = Recorder::new(RecorderConfig::default())
        .with_audio_source(SyntheticAudioSource::factory(48000, 2))
        .with_sink(opener);

    let session = recorder.start("late.mp4", W, H).expect("start");
    // Roughly 25 chunks are captured before the producer's first frame
    std::thread::sleep(Duration::from_millis(500));
    feed_frames(&session, 5);
    let stats = session.stop().expect("stop");

    assert_eq!(stats.video_packets, 5);
    assert!(
        stats.dropped_audio_chunks >= 10,
        "only {} chunks discarded",
        stats.dropped_audio_chunks
    );

    let log = log.lock().unwrap();
    let video_end = log
        .packets
        .iter()
        .filter(|p| p.stream == StreamId::Video)
        .map(|p| p.pts.as_secs())
        .fold(0.0, f64::max);
    let audio_end = log
        .packets
        .iter()
        .filter(|p| p.stream == StreamId::Audio)
        .map(|p| p.pts.as_secs() + 0.02)
        .fold(0.0, f64::max);

    // Slack covers encode waits in feed_frames and the idle before stop;
    // a 500ms audio lead would exceed it
    assert!(
        audio_end < video_end + 0.3,
        "audio runs to {:.3}s but video ends at {:.3}s",
        audio_end,
        video_end
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTAINER
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_mp4_with_audio_track() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("av.mp4");
    let recorder = Recorder::new(RecorderConfig::default())
        .with_audio_source(SyntheticAudioSource::factory(48000, 2));

    let session = recorder.start(&output, W, H).expect("start");
    feed_frames(&session, 10);
    let stats = session.stop().expect("stop");

    assert_eq!(stats.video_packets, 10);
    assert!(stats.audio_packets > 0);
    assert!(stats.bytes_written > 0);
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
}
