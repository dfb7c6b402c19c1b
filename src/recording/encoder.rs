//! H.264 video encode stage using openh264

use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

use super::packet::EncodedPacket;
use crate::errors::RecorderError;
use crate::timing::PacketTimestamp;

/// Turns converted I420 frames into H.264 packets
pub struct VideoEncodeStage {
    encoder: Encoder,
    width: u32,
    height: u32,
    keyframe_interval: u64,
    frame_count: u64,
    packets_emitted: u64,
}

impl VideoEncodeStage {
    /// Open the video codec.
    ///
    /// openh264 takes its dimensions from each YUV source at encode time, so
    /// only the canvas size is kept here for validation. Any failure is a
    /// `ResourceError`: there is no recording without video.
    pub fn new(width: u32, height: u32, keyframe_interval: u32) -> Result<Self, RecorderError> {
        let encoder = Encoder::new().map_err(|e| {
            RecorderError::ResourceError(format!("Could not open video codec: {}", e))
        })?;

        Ok(Self {
            encoder,
            width,
            height,
            keyframe_interval: keyframe_interval.max(1) as u64,
            frame_count: 0,
            packets_emitted: 0,
        })
    }

    /// Encode one I420 frame.
    ///
    /// Returns `None` when the codec produced no output for this frame
    /// (rate-control skip). The packet carries `pts` unchanged and no DTS.
    pub fn encode(
        &mut self,
        yuv: &[u8],
        pts: PacketTimestamp,
    ) -> Result<Option<EncodedPacket>, RecorderError> {
        let expected = self.width as usize * self.height as usize * 3 / 2;
        if yuv.len() != expected {
            return Err(RecorderError::EncodingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                yuv.len()
            )));
        }

        if self.frame_count > 0 && self.frame_count % self.keyframe_interval == 0 {
            self.encoder.force_intra_frame();
        }

        let yuv_buffer = YUVBuffer::from_vec(yuv.to_vec(), self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| RecorderError::EncodingError(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);
        let data = bitstream.to_vec();

        if data.is_empty() {
            log::debug!("Codec emitted no data for frame {}", self.frame_count);
            return Ok(None);
        }

        self.packets_emitted += 1;
        Ok(Some(EncodedPacket::video(data, pts, is_keyframe)))
    }

    /// Frames handed to the codec so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn packets_emitted(&self) -> u64 {
        self.packets_emitted
    }
}
