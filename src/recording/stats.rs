//! Per-session statistics

use serde::{Deserialize, Serialize};

/// Statistics returned after a session is stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Video packets written to the container
    pub video_packets: u64,
    /// Audio packets written to the container
    pub audio_packets: u64,
    /// Frames overwritten in the slot before the encoder reached them
    pub dropped_frames: u64,
    /// Audio chunks dropped from a full queue or discarded while audio was degraded
    pub dropped_audio_chunks: u64,
    /// Duration in seconds as reported by the container
    pub duration_secs: f64,
    /// Total bytes written to file
    pub bytes_written: u64,
    /// Whether the container carries an audio track
    pub audio_recorded: bool,
    /// The audio failure that degraded this session, if any
    pub audio_error: Option<String>,
    /// Output file path
    pub output_path: String,
}

impl RecordingStats {
    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}
