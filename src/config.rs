//! Configuration management for framerec
//!
//! Provides loading, saving and validation of recorder settings: video
//! timebase and keyframe cadence, audio capture/encoding parameters and
//! container options.

use crate::errors::RecorderError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ticks per second of the video timebase (divisible by 24, 25, 30 and 60).
pub const DEFAULT_VIDEO_TIMEBASE: u32 = 600;

/// Opus frame size in samples at 48kHz (20ms).
pub const DEFAULT_CHUNK_FRAMES: usize = 960;

/// 256 chunks x 20ms = 5.12 seconds of audio buffered before dropping oldest.
pub const DEFAULT_AUDIO_QUEUE_CAPACITY: usize = 256;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub output: OutputConfig,
}

/// Video stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Timestamp ticks per second
    pub timebase: u32,
    /// Nominal frame rate written into the container header
    pub fps_hint: f64,
    /// Force an intra frame every N encoded frames (1 = all intra)
    pub keyframe_interval: u32,
}

/// Audio capture and encoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture audio when an audio source is attached to the recorder
    pub enabled: bool,
    /// Sample rate in Hz (Opus requires 48000)
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Target Opus bitrate in bits per second
    pub bitrate: u32,
    /// Samples per channel in one captured chunk
    pub chunk_frames: usize,
    /// Linear gain applied to captured samples
    pub gain: f32,
    /// Maximum chunks pending between capture and encoder threads
    pub queue_capacity: usize,
    /// How long a single blocking read may wait before it is treated as a failure
    pub read_timeout_ms: u64,
}

/// Container configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Place moov before mdat (buffers the recording until finish)
    pub fast_start: bool,
    /// Optional title metadata
    pub title: Option<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            timebase: DEFAULT_VIDEO_TIMEBASE,
            fps_hint: 60.0,
            keyframe_interval: 30,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 48000,
            channels: 2,
            bitrate: 128_000,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            gain: 0.8,
            queue_capacity: DEFAULT_AUDIO_QUEUE_CAPACITY,
            read_timeout_ms: 500,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fast_start: false,
            title: None,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RecorderConfig {
    /// Video-only configuration
    pub fn video_only() -> Self {
        let mut config = Self::default();
        config.audio.enabled = false;
        config
    }

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecorderError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            RecorderError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: RecorderConfig = toml::from_str(&contents).map_err(|e| {
            RecorderError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecorderError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RecorderError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            RecorderError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, contents).map_err(|e| {
            RecorderError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.video.timebase == 0 {
            return Err(RecorderError::ConfigError(
                "video.timebase must be positive".to_string(),
            ));
        }
        if !(self.video.fps_hint > 0.0) {
            return Err(RecorderError::ConfigError(
                "video.fps_hint must be positive".to_string(),
            ));
        }
        if self.video.keyframe_interval == 0 {
            return Err(RecorderError::ConfigError(
                "video.keyframe_interval must be at least 1".to_string(),
            ));
        }
        if self.audio.channels == 0 || self.audio.chunk_frames == 0 || self.audio.sample_rate == 0 {
            return Err(RecorderError::ConfigError(
                "audio.channels, audio.chunk_frames and audio.sample_rate must be positive"
                    .to_string(),
            ));
        }
        if self.audio.queue_capacity == 0 {
            return Err(RecorderError::ConfigError(
                "audio.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
