//! Synthetic frames and audio for offline testing
//!
//! Lets the full pipeline run without a renderer or a microphone.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::audio::{AudioSource, AudioSourceFactory};
use crate::errors::RecorderError;
use crate::handoff::lock;
use crate::recording::{EncodedPacket, MuxStats, PacketSink, SinkOpener, StreamId, StreamLayout};

/// A bottom-up RGBA frame with a gradient that shifts every frame
/// (exercises temporal encoding)
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 4) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 4) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
            data[idx + 3] = 255;
        }
    }

    data
}

/// One chunk of a 440Hz sine (A4), interleaved, same value on every channel
pub fn synthetic_audio_chunk(chunk_number: u64, frames: usize, channels: u16) -> Vec<f32> {
    let sample_rate = 48000.0;
    let frequency = 440.0;
    let channels = channels as usize;

    let mut samples = vec![0.0f32; frames * channels];
    for i in 0..frames {
        let t = (chunk_number as f64 * frames as f64 + i as f64) / sample_rate;
        let value = (2.0 * std::f64::consts::PI * frequency * t).sin() as f32 * 0.3;
        for c in 0..channels {
            samples[i * channels + c] = value;
        }
    }
    samples
}

/// Sine-wave source, optionally paced to real time
pub struct SyntheticAudioSource {
    sample_rate: u32,
    channels: u16,
    chunks_read: u64,
    paced: bool,
}

impl SyntheticAudioSource {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            chunks_read: 0,
            paced: true,
        }
    }

    /// Return chunks immediately instead of sleeping for their duration
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Factory producing a fresh paced source per session
    pub fn factory(sample_rate: u32, channels: u16) -> AudioSourceFactory {
        Arc::new(move || {
            Ok(Box::new(SyntheticAudioSource::new(sample_rate, channels)) as Box<dyn AudioSource>)
        })
    }
}

impl AudioSource for SyntheticAudioSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read_chunk(&mut self, frames: usize) -> Result<Vec<f32>, RecorderError> {
        if self.paced {
            thread::sleep(Duration::from_secs_f64(
                frames as f64 / self.sample_rate.max(1) as f64,
            ));
        }
        let chunk = synthetic_audio_chunk(self.chunks_read, frames, self.channels);
        self.chunks_read += 1;
        Ok(chunk)
    }
}

/// Source that delivers a fixed number of chunks and then fails
pub struct FailingAudioSource {
    inner: SyntheticAudioSource,
    remaining: usize,
}

impl FailingAudioSource {
    pub fn after(chunks: usize) -> Self {
        Self {
            inner: SyntheticAudioSource::new(48000, 2),
            remaining: chunks,
        }
    }

    /// Factory whose sources fail after `chunks` reads
    pub fn factory(chunks: usize) -> AudioSourceFactory {
        Arc::new(move || Ok(Box::new(FailingAudioSource::after(chunks)) as Box<dyn AudioSource>))
    }

    /// Factory that cannot open a source at all
    pub fn unavailable() -> AudioSourceFactory {
        Arc::new(|| Err(RecorderError::AudioError("No audio device".to_string())))
    }
}

impl AudioSource for FailingAudioSource {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn read_chunk(&mut self, frames: usize) -> Result<Vec<f32>, RecorderError> {
        if self.remaining == 0 {
            return Err(RecorderError::AudioError("Audio device removed".to_string()));
        }
        self.remaining -= 1;
        self.inner.read_chunk(frames)
    }
}

/// Shared log of what a [`CollectingSink`] received
#[derive(Debug, Default)]
pub struct SinkLog {
    pub layout: Option<StreamLayout>,
    pub packets: Vec<EncodedPacket>,
    pub closed: bool,
}

/// In-memory packet sink for inspecting the exact packet sequence
pub struct CollectingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl CollectingSink {
    /// A sink opener plus the log every opened sink appends to
    pub fn opener() -> (SinkOpener, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        let shared = log.clone();
        let opener: SinkOpener = Arc::new(move |_path: &std::path::Path, layout: &StreamLayout| {
            let mut g = lock(&shared);
            *g = SinkLog {
                layout: Some(layout.clone()),
                ..SinkLog::default()
            };
            Ok(Box::new(CollectingSink {
                log: shared.clone(),
            }) as Box<dyn PacketSink>)
        });
        (opener, log)
    }
}

impl PacketSink for CollectingSink {
    fn write(&mut self, packet: &EncodedPacket) -> Result<(), RecorderError> {
        lock(&self.log).packets.push(packet.clone());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<MuxStats, RecorderError> {
        let mut g = lock(&self.log);
        g.closed = true;
        let video_packets = g
            .packets
            .iter()
            .filter(|p| p.stream == StreamId::Video)
            .count() as u64;
        let audio_packets = g.packets.len() as u64 - video_packets;
        Ok(MuxStats {
            video_packets,
            audio_packets,
            duration_secs: 0.0,
            bytes_written: g.packets.iter().map(|p| p.data.len() as u64).sum(),
        })
    }
}
