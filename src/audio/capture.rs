//! Audio capture loop
//!
//! Runs on its own thread for the life of a session: opens the source, then
//! repeatedly performs a blocking read and pushes the chunk onto the
//! [`AudioQueue`]. The stop flag is checked between reads, so a stop request
//! takes effect after the read in progress returns.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use super::source::{AudioSource, AudioSourceFactory};
use crate::config::AudioConfig;
use crate::errors::RecorderError;
use crate::handoff::{AudioChunk, AudioQueue, Handoff, SubmitOutcome};

/// Outcome of one capture thread
#[derive(Debug, Default)]
pub struct CaptureReport {
    pub chunks_captured: u64,
    /// First and only error reported by the source, if any
    pub error: Option<RecorderError>,
}

/// Open the source and check it delivers the configured format.
///
/// No resampling or channel mixing is done here.
fn open_source(
    factory: &AudioSourceFactory,
    config: &AudioConfig,
) -> Result<Box<dyn AudioSource>, RecorderError> {
    let source = factory()?;
    if source.sample_rate() != config.sample_rate || source.channels() != config.channels {
        return Err(RecorderError::AudioError(format!(
            "Audio source delivers {} Hz x {} channels, recorder expects {} Hz x {}",
            source.sample_rate(),
            source.channels(),
            config.sample_rate,
            config.channels
        )));
    }
    Ok(source)
}

/// Capture until `stop` is raised or the source fails.
///
/// The result of opening the source is sent on `ready` before the first
/// read. A read error ends capture for the rest of the session and is
/// reported once.
pub fn run_capture(
    factory: AudioSourceFactory,
    config: AudioConfig,
    queue: &AudioQueue,
    stop: &AtomicBool,
    ready: Sender<Result<(), RecorderError>>,
) -> CaptureReport {
    let mut report = CaptureReport::default();

    let mut source = match open_source(&factory, &config) {
        Ok(source) => {
            let _ = ready.send(Ok(()));
            source
        }
        Err(e) => {
            let _ = ready.send(Err(e.clone()));
            report.error = Some(e);
            return report;
        }
    };
    drop(ready);

    let mut sequence = 0u64;
    while !stop.load(Ordering::Acquire) {
        let mut samples = match source.read_chunk(config.chunk_frames) {
            Ok(samples) => samples,
            Err(e) => {
                if !stop.load(Ordering::Acquire) {
                    log::warn!("Audio capture failed, continuing video only: {}", e);
                    report.error = Some(e);
                }
                break;
            }
        };

        if config.gain != 1.0 {
            for sample in samples.iter_mut() {
                *sample *= config.gain;
            }
        }

        let chunk = AudioChunk {
            sequence,
            samples,
            channels: config.channels,
        };
        sequence += 1;

        match queue.submit(chunk) {
            SubmitOutcome::Queued => {}
            SubmitOutcome::Replaced => log::debug!("Audio queue full, dropped oldest chunk"),
            SubmitOutcome::Rejected => break,
        }
        report.chunks_captured += 1;
    }

    log::debug!("Audio capture exiting after {} chunks", report.chunks_captured);
    report
}
