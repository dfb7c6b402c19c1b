//! Blocking audio sources feeding the capture thread
//!
//! Device enumeration and selection happen outside this crate; a source is
//! handed over ready to read. Sources are constructed by an
//! [`AudioSourceFactory`] on the capture thread itself, since some backends
//! (cpal streams among them) cannot move between threads.

use std::sync::Arc;

use crate::errors::RecorderError;

/// A ready-to-read capture endpoint producing interleaved f32 PCM
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Block until `frames` samples per channel are available and return
    /// them interleaved (`frames * channels` values).
    fn read_chunk(&mut self, frames: usize) -> Result<Vec<f32>, RecorderError>;
}

/// Opens an audio source on the capture thread; called once per session
pub type AudioSourceFactory =
    Arc<dyn Fn() -> Result<Box<dyn AudioSource>, RecorderError> + Send + Sync>;

#[cfg(feature = "audio-device")]
pub use cpal_source::CpalAudioSource;

#[cfg(feature = "audio-device")]
mod cpal_source {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Stream, StreamConfig};
    use crossbeam_channel::{Receiver, RecvTimeoutError};

    use super::{AudioSource, AudioSourceFactory};
    use crate::config::AudioConfig;
    use crate::errors::RecorderError;

    /// Callback buffers held before the oldest are dropped
    const MAX_BUFFERED_CALLBACKS: usize = 256;

    /// Input stream from a cpal device, read through a bounded channel
    pub struct CpalAudioSource {
        stream: Stream,
        receiver: Receiver<Vec<f32>>,
        pending: Vec<f32>,
        is_running: Arc<AtomicBool>,
        sample_rate: u32,
        channels: u16,
        read_timeout: Duration,
    }

    impl CpalAudioSource {
        /// Open the host's default input device
        pub fn default_input(
            sample_rate: u32,
            channels: u16,
            read_timeout: Duration,
        ) -> Result<Self, RecorderError> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| RecorderError::AudioError("No default audio device".to_string()))?;
            Self::from_device(&device, sample_rate, channels, read_timeout)
        }

        /// Open an input stream on a device selected by the caller
        pub fn from_device(
            device: &cpal::Device,
            sample_rate: u32,
            channels: u16,
            read_timeout: Duration,
        ) -> Result<Self, RecorderError> {
            let config = StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let (sender, receiver) = crossbeam_channel::bounded(MAX_BUFFERED_CALLBACKS);
            let is_running = Arc::new(AtomicBool::new(true));
            let is_running_clone = is_running.clone();

            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !is_running_clone.load(Ordering::Relaxed) {
                            return;
                        }
                        // Non-blocking: a full channel drops this buffer
                        let _ = sender.try_send(data.to_vec());
                    },
                    move |err| {
                        log::error!("Audio capture error: {}", err);
                    },
                    None,
                )
                .map_err(|e| RecorderError::AudioError(format!("Failed to build stream: {}", e)))?;

            stream
                .play()
                .map_err(|e| RecorderError::AudioError(format!("Failed to start stream: {}", e)))?;

            Ok(Self {
                stream,
                receiver,
                pending: Vec::new(),
                is_running,
                sample_rate,
                channels,
                read_timeout,
            })
        }

        /// Factory opening the default input with the recorder's audio settings
        pub fn default_factory(config: &AudioConfig) -> AudioSourceFactory {
            let sample_rate = config.sample_rate;
            let channels = config.channels;
            let read_timeout = Duration::from_millis(config.read_timeout_ms);
            Arc::new(move || {
                Ok(Box::new(CpalAudioSource::default_input(
                    sample_rate,
                    channels,
                    read_timeout,
                )?) as Box<dyn AudioSource>)
            })
        }
    }

    impl AudioSource for CpalAudioSource {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn channels(&self) -> u16 {
            self.channels
        }

        fn read_chunk(&mut self, frames: usize) -> Result<Vec<f32>, RecorderError> {
            let wanted = frames * self.channels as usize;
            while self.pending.len() < wanted {
                match self.receiver.recv_timeout(self.read_timeout) {
                    Ok(buf) => self.pending.extend_from_slice(&buf),
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(RecorderError::AudioError(format!(
                            "No audio delivered within {:?}",
                            self.read_timeout
                        )));
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(RecorderError::AudioError(
                            "Audio stream disconnected".to_string(),
                        ));
                    }
                }
            }
            Ok(self.pending.drain(..wanted).collect())
        }
    }

    impl Drop for CpalAudioSource {
        fn drop(&mut self) {
            self.is_running.store(false, Ordering::Relaxed);
            let _ = self.stream.pause();
        }
    }
}
