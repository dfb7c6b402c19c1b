//! Encoded packets travelling from the encode stages to the muxer

use serde::{Deserialize, Serialize};

use crate::timing::PacketTimestamp;

/// Stream a packet belongs to, in the container's track order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamId {
    Video = 0,
    Audio = 1,
}

/// One compressed unit, consumed immediately by the muxer
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub stream: StreamId,
    /// H.264 Annex B bytes or a raw Opus packet
    pub data: Vec<u8>,
    pub pts: PacketTimestamp,
    /// Always unset: neither codec reorders frames
    pub dts: Option<PacketTimestamp>,
    pub is_keyframe: bool,
}

impl EncodedPacket {
    pub fn video(data: Vec<u8>, pts: PacketTimestamp, is_keyframe: bool) -> Self {
        Self {
            stream: StreamId::Video,
            data,
            pts,
            dts: None,
            is_keyframe,
        }
    }

    /// Every Opus packet decodes independently, so audio is always a keyframe
    pub fn audio(data: Vec<u8>, pts: PacketTimestamp) -> Self {
        Self {
            stream: StreamId::Audio,
            data,
            pts,
            dts: None,
            is_keyframe: true,
        }
    }
}
