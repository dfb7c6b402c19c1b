//! Video recording pipeline for framerec
//!
//! This module provides the encoder-thread half of a session using:
//! - a BT.601 RGBA to I420 converter
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing
//!
//! # Example
//! ```rust,ignore
//! use framerec::config::RecorderConfig;
//! use framerec::recording::Recorder;
//!
//! let recorder = Recorder::new(RecorderConfig::video_only());
//! let session = recorder.start("output.mp4", 1280, 720)?;
//!
//! // In your render loop:
//! if session.is_accepting_frames() {
//!     session.submit_frame(rgba, 1280, 720, std::time::Instant::now());
//! }
//!
//! // When done:
//! let stats = session.stop()?;
//! ```

mod convert;
mod encoder;
mod muxer;
mod packet;
mod recorder;
mod stats;

pub use convert::ColorConverter;
pub use encoder::VideoEncodeStage;
pub use muxer::{AudioLayout, Mp4Muxer, MuxStats, PacketSink, StreamLayout};
pub use packet::{EncodedPacket, StreamId};
pub use recorder::{Recorder, RecorderState, SessionHandle, SinkOpener};
pub use stats::RecordingStats;
