//! Audio capture and encoding module for framerec
//!
//! This module provides the audio half of the pipeline using:
//! - cpal for capture from the default input (feature `audio-device`)
//! - libopus for encoding
//!
//! Submodules:
//! - `source`: blocking audio source abstraction
//! - `capture`: capture-thread loop feeding the audio queue
//! - `encoder`: Opus encode stage with sample-counter timestamps

mod capture;
mod encoder;
mod source;

pub use capture::{run_capture, CaptureReport};
pub use encoder::AudioEncodeStage;
pub use source::{AudioSource, AudioSourceFactory};

#[cfg(feature = "audio-device")]
pub use source::CpalAudioSource;
