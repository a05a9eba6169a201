//! Zone and playback types.
//!
//! Field names follow the JSON pushed by the Roon transport service so the
//! daemon can deserialize zone payloads directly.

use serde::{Deserialize, Serialize};

/// A logical playback endpoint tracked by Roon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    pub zone_id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub state: PlaybackState,

    /// Absent while the queue is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<NowPlaying>,

    #[serde(default)]
    pub outputs: Vec<Output>,

    #[serde(default)]
    pub settings: ZoneSettings,

    // Transport controls the Core currently accepts for this zone
    #[serde(default)]
    pub is_play_allowed: bool,
    #[serde(default)]
    pub is_pause_allowed: bool,
    #[serde(default)]
    pub is_next_allowed: bool,
    #[serde(default)]
    pub is_previous_allowed: bool,
    #[serde(default)]
    pub is_seek_allowed: bool,
}

impl Zone {
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

/// Transport state as Roon reports it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    Loading,
    /// Anything Roon reports that we don't model
    #[default]
    #[serde(other)]
    Unknown,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Loading => "loading",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The item at the head of a zone's queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NowPlaying {
    /// Seconds into the track
    #[serde(default)]
    pub seek_position: Option<i64>,

    /// Seconds
    #[serde(default)]
    pub length: Option<u32>,

    /// Artwork key for the image service
    #[serde(default)]
    pub image_key: Option<String>,

    /// Title / artists / album as display lines
    #[serde(default)]
    pub three_line: ThreeLine,
}

/// Roon's three-line display of the current track.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThreeLine {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    #[serde(default)]
    pub line3: String,
}

/// An output (audio device) inside a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    pub output_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub volume: Option<VolumeInfo>,
}

/// Volume control information for an output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumeInfo {
    /// In the output's own scale (dB or 0..100)
    pub value: Option<f32>,
    /// Minimum volume value (e.g., -64 for dB, 0 for number)
    pub min: Option<f32>,
    /// Maximum volume value
    pub max: Option<f32>,
    /// Volume step size
    pub step: Option<f32>,
    pub is_muted: Option<bool>,
}

/// Zone settings pushed alongside playback state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneSettings {
    #[serde(rename = "loop", default)]
    pub loop_mode: LoopMode,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub auto_radio: bool,
}

/// Roon loop setting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    #[default]
    Disabled,
    Loop,
    LoopOne,
    Next,
}

/// Seek position change for a single zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeekUpdate {
    pub zone_id: String,
    /// Position in seconds; absent when nothing is loaded
    #[serde(default)]
    pub seek_position: Option<i64>,
    #[serde(default)]
    pub queue_time_remaining: i64,
}
