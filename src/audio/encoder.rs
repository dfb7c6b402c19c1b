//! Opus audio encode stage
//!
//! Each queued chunk is exactly one Opus frame, so every chunk yields one
//! packet. Timestamps come from a sample counter that advances by the chunk's
//! frame count once per chunk.

use crate::config::AudioConfig;
use crate::errors::RecorderError;
use crate::handoff::AudioChunk;
use crate::recording::EncodedPacket;
use crate::timing::SampleClock;

/// Value 2049 = OPUS_APPLICATION_AUDIO (optimized for music/mixed content)
const OPUS_APPLICATION_AUDIO: i32 = 2049;

/// Frame sizes libopus accepts at 48kHz: 2.5, 5, 10, 20, 40 and 60 ms
const OPUS_FRAME_SIZES: [usize; 6] = [120, 240, 480, 960, 1920, 2880];

/// Largest packet libopus will produce
const MAX_PACKET_BYTES: usize = 4000;

/// Owned libopus encoder.
///
/// Created and used on the encoder thread only. `Send` so it may be built
/// elsewhere and moved in; deliberately not `Sync`.
struct OpusHandle(*mut libopus_sys::OpusEncoder);

// SAFETY: libopus encoders may be used from any single thread; the handle is
// neither `Clone` nor `Sync`, so it is never accessed concurrently.
unsafe impl Send for OpusHandle {}

impl Drop for OpusHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { libopus_sys::opus_encoder_destroy(self.0) };
        }
    }
}

/// Opus encoder with its own sample-based timeline
pub struct AudioEncodeStage {
    encoder: OpusHandle,
    channels: u16,
    chunk_frames: usize,
    clock: SampleClock,
    output: Vec<u8>,
}

impl AudioEncodeStage {
    /// Open the audio codec.
    ///
    /// Opus needs 48kHz, one or two channels, and a legal frame size; any
    /// mismatch is reported as `AudioError` so the caller can degrade to a
    /// video-only recording.
    pub fn new(config: &AudioConfig) -> Result<Self, RecorderError> {
        if config.sample_rate != 48000 {
            return Err(RecorderError::AudioError(format!(
                "Opus requires 48000 Hz sample rate, got {}",
                config.sample_rate
            )));
        }
        if config.channels != 1 && config.channels != 2 {
            return Err(RecorderError::AudioError(
                "Opus supports only mono (1) or stereo (2) channels".to_string(),
            ));
        }
        if !OPUS_FRAME_SIZES.contains(&config.chunk_frames) {
            return Err(RecorderError::AudioError(format!(
                "Chunk of {} frames is not a valid Opus frame size",
                config.chunk_frames
            )));
        }

        let mut error: i32 = 0;
        let encoder = unsafe {
            libopus_sys::opus_encoder_create(
                config.sample_rate as i32,
                config.channels as i32,
                OPUS_APPLICATION_AUDIO,
                &mut error,
            )
        };

        if encoder.is_null() || error != 0 {
            return Err(RecorderError::AudioError(format!(
                "Failed to create Opus encoder: error code {}",
                error
            )));
        }
        let encoder = OpusHandle(encoder);

        let result = unsafe {
            libopus_sys::opus_encoder_ctl(
                encoder.0,
                libopus_sys::OPUS_SET_BITRATE_REQUEST as i32,
                config.bitrate as i32,
            )
        };
        if result != 0 {
            return Err(RecorderError::AudioError(format!(
                "Failed to set bitrate: error code {}",
                result
            )));
        }

        Ok(Self {
            encoder,
            channels: config.channels,
            chunk_frames: config.chunk_frames,
            clock: SampleClock::new(config.sample_rate),
            output: vec![0u8; MAX_PACKET_BYTES],
        })
    }

    /// Encode one chunk.
    ///
    /// The packet's PTS is the number of samples written before this chunk.
    /// Short chunks are zero-padded to a full frame.
    pub fn encode(&mut self, chunk: &AudioChunk) -> Result<Option<EncodedPacket>, RecorderError> {
        if chunk.channels != self.channels {
            return Err(RecorderError::AudioError(format!(
                "Channel count mismatch: expected {}, got {}",
                self.channels, chunk.channels
            )));
        }

        let frame_len = self.chunk_frames * self.channels as usize;
        let padded;
        let samples: &[f32] = if chunk.samples.len() >= frame_len {
            &chunk.samples[..frame_len]
        } else {
            let mut buf = chunk.samples.clone();
            buf.resize(frame_len, 0.0);
            padded = buf;
            &padded
        };

        let pts = self.clock.advance(self.chunk_frames as u64);

        let len = unsafe {
            libopus_sys::opus_encode_float(
                self.encoder.0,
                samples.as_ptr(),
                self.chunk_frames as i32,
                self.output.as_mut_ptr(),
                self.output.len() as i32,
            )
        };

        if len < 0 {
            return Err(RecorderError::AudioError(format!(
                "Opus encoding failed: error code {}",
                len
            )));
        }
        if len == 0 {
            return Ok(None);
        }

        Ok(Some(EncodedPacket::audio(
            self.output[..len as usize].to_vec(),
            pts,
        )))
    }

    /// Samples per channel consumed so far
    pub fn samples_written(&self) -> u64 {
        self.clock.samples_written()
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }
}
