//! MP4 container output using muxide

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use muxide::api::{AudioCodec, Metadata, MuxerBuilder, VideoCodec};
use serde::{Deserialize, Serialize};

use super::packet::{EncodedPacket, StreamId};
use crate::errors::RecorderError;

/// Streams declared in the container header
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLayout {
    pub width: u32,
    pub height: u32,
    pub fps_hint: f64,
    /// `None` when audio is disabled or degraded at start
    pub audio: Option<AudioLayout>,
    pub fast_start: bool,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioLayout {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Totals reported when a container is closed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuxStats {
    pub video_packets: u64,
    pub audio_packets: u64,
    pub duration_secs: f64,
    pub bytes_written: u64,
}

/// Destination for encoded packets.
///
/// Sinks are opened and used on the encoder thread only, so they need not be
/// `Send`.
pub trait PacketSink {
    /// Append one packet to its stream, preserving order within the stream
    fn write(&mut self, packet: &EncodedPacket) -> Result<(), RecorderError>;

    /// Write the trailer and release the container
    fn close(self: Box<Self>) -> Result<MuxStats, RecorderError>;
}

/// MP4 muxer: H.264 video track plus an optional Opus audio track
pub struct Mp4Muxer {
    muxer: muxide::api::Muxer<BufWriter<File>>,
    path: PathBuf,
    has_audio: bool,
    video_packets: u64,
    audio_packets: u64,
}

impl Mp4Muxer {
    /// Create the output file and write the container header.
    ///
    /// Fails with `ResourceError` if the path is not writable; no empty file is
    /// left behind silently.
    pub fn open<P: AsRef<Path>>(path: P, layout: &StreamLayout) -> Result<Self, RecorderError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            RecorderError::ResourceError(format!(
                "Failed to create output file {}: {}",
                path.display(),
                e
            ))
        })?;
        let writer = BufWriter::new(file);

        let mut builder = MuxerBuilder::new(writer)
            .video(VideoCodec::H264, layout.width, layout.height, layout.fps_hint)
            .with_fast_start(layout.fast_start);

        if let Some(audio) = layout.audio {
            builder = builder.audio(AudioCodec::Opus, audio.sample_rate, audio.channels);
        }

        let metadata = match layout.title {
            Some(ref title) => Metadata::new().with_title(title).with_current_time(),
            None => Metadata::new().with_current_time(),
        };
        builder = builder.with_metadata(metadata);

        let muxer = builder
            .build()
            .map_err(|e| RecorderError::ResourceError(format!("Failed to create muxer: {}", e)))?;

        log::info!(
            "Opened {} ({}x{}, audio: {})",
            path.display(),
            layout.width,
            layout.height,
            layout.audio.is_some()
        );

        Ok(Self {
            muxer,
            path: path.to_path_buf(),
            has_audio: layout.audio.is_some(),
            video_packets: 0,
            audio_packets: 0,
        })
    }

    /// [`Mp4Muxer::open`] boxed as a [`PacketSink`]
    pub fn open_sink(path: &Path, layout: &StreamLayout) -> Result<Box<dyn PacketSink>, RecorderError> {
        Ok(Box::new(Self::open(path, layout)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PacketSink for Mp4Muxer {
    fn write(&mut self, packet: &EncodedPacket) -> Result<(), RecorderError> {
        match packet.stream {
            StreamId::Video => {
                self.muxer
                    .write_video(packet.pts.as_secs(), &packet.data, packet.is_keyframe)
                    .map_err(|e| {
                        RecorderError::MuxingError(format!("Failed to write video packet: {}", e))
                    })?;
                self.video_packets += 1;
            }
            StreamId::Audio => {
                if !self.has_audio {
                    return Err(RecorderError::MuxingError(
                        "Audio packet written to a container without an audio track".to_string(),
                    ));
                }
                self.muxer
                    .write_audio(packet.pts.as_secs(), &packet.data)
                    .map_err(|e| {
                        RecorderError::MuxingError(format!("Failed to write audio packet: {}", e))
                    })?;
                self.audio_packets += 1;
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<MuxStats, RecorderError> {
        let Mp4Muxer {
            muxer,
            path,
            video_packets,
            audio_packets,
            ..
        } = *self;

        match muxer.finish_with_stats() {
            Ok(stats) => {
                log::info!(
                    "Finalized {}: {} video / {} audio packets, {} bytes",
                    path.display(),
                    stats.video_frames,
                    stats.audio_frames,
                    stats.bytes_written
                );
                Ok(MuxStats {
                    video_packets: stats.video_frames,
                    audio_packets: stats.audio_frames,
                    duration_secs: stats.duration_secs,
                    bytes_written: stats.bytes_written,
                })
            }
            // A session stopped before its first frame has nothing to finalize
            Err(e) if video_packets == 0 && audio_packets == 0 => {
                log::debug!("Closing empty container {}: {}", path.display(), e);
                let bytes_written = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                Ok(MuxStats {
                    bytes_written,
                    ..MuxStats::default()
                })
            }
            Err(e) => Err(RecorderError::MuxingError(format!(
                "Failed to finalize recording: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::PacketTimestamp;
    use tempfile::tempdir;

    fn layout(audio: bool) -> StreamLayout {
        StreamLayout {
            width: 320,
            height: 240,
            fps_hint: 30.0,
            audio: audio.then_some(AudioLayout {
                sample_rate: 48000,
                channels: 2,
            }),
            fast_start: false,
            title: None,
        }
    }

    #[test]
    fn test_unwritable_path_fails_loudly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.mp4");
        let err = Mp4Muxer::open(&path, &layout(false)).err().expect("open must fail");
        assert!(matches!(err, RecorderError::ResourceError(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_close_without_packets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        let muxer = Mp4Muxer::open_sink(&path, &layout(true)).unwrap();

        let stats = muxer.close().expect("closing an empty container is safe");
        assert_eq!(stats.video_packets, 0);
        assert_eq!(stats.audio_packets, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_audio_without_track_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("video_only.mp4");
        let mut muxer = Mp4Muxer::open(&path, &layout(false)).unwrap();

        let packet = EncodedPacket::audio(vec![0xfc, 0xff, 0xfe], PacketTimestamp::new(0, 48000));
        assert!(matches!(
            muxer.write(&packet),
            Err(RecorderError::MuxingError(_))
        ));
    }
}
