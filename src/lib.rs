//! framerec: real-time capture-to-MP4 recording
//!
//! Records a stream of rendered frames, and optionally microphone audio, into
//! an MP4 file without stalling the thread that produces the frames.
//!
//! # Features
//! - Single-slot video handoff: the newest frame wins, the producer never waits
//! - Bounded audio FIFO fed by a dedicated capture thread
//! - BT.601 RGBA to I420 conversion, H.264 via openh264, Opus via libopus
//! - MP4 output via muxide, finalized on every shutdown path
//! - Audio failures degrade the session to video only
//!
//! # Usage
//! ```rust,ignore
//! use framerec::{config::RecorderConfig, Recorder};
//!
//! framerec::init_logging();
//! let recorder = Recorder::new(RecorderConfig::default())
//!     .with_audio_source(framerec::audio::CpalAudioSource::default_factory(
//!         &RecorderConfig::default().audio,
//!     ));
//! let session = recorder.start("capture.mp4", 1920, 1080)?;
//! // ... submit frames from the render loop ...
//! let stats = session.stop()?;
//! println!("{} frames written", stats.video_packets);
//! ```
pub mod audio;
pub mod config;
pub mod errors;
pub mod handoff;
pub mod recording;
pub mod timing;

// Testing utilities - synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::RecorderConfig;
pub use errors::RecorderError;
pub use handoff::SubmitOutcome;
pub use recording::{Recorder, RecorderState, RecordingStats, SessionHandle};

/// Initialize logging for the recorder
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "framerec=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "framerec");
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
