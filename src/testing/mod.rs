//! Testing utilities for framerec
//!
//! Synthetic frames, audio sources and an in-memory packet sink so sessions
//! can run without a renderer, a microphone or a container on disk.

pub mod synthetic_data;

pub use synthetic_data::{
    synthetic_audio_chunk, synthetic_video_frame, CollectingSink, FailingAudioSource, SinkLog,
    SyntheticAudioSource,
};
