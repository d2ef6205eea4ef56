use serde::{Deserialize, Serialize};
use webmux_media::{MuxerOptions, SegmentSize};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub encoder: EncoderSettings,

    #[serde(default)]
    pub muxer: MuxerSettings,

    /// Number of frames the caller intends to submit; only used for progress
    #[serde(default)]
    pub expected_frames: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VideoConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,

    #[serde(default = "default_video_track")]
    pub track_number: u8,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_frame_rate() -> f64 {
    30.0
}

fn default_video_track() -> u8 {
    1
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            track_number: default_video_track(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AudioConfig {
    /// Add an audio track to the document
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_audio_codec")]
    pub codec: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[serde(default = "default_channels")]
    pub channels: u8,

    #[serde(default = "default_audio_track")]
    pub track_number: u8,
}

fn default_audio_codec() -> String {
    "opus".to_string()
}

fn default_sample_rate() -> f64 {
    48_000.0
}

fn default_channels() -> u8 {
    2
}

fn default_audio_track() -> u8 {
    2
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            codec: default_audio_codec(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            track_number: default_audio_track(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EncoderSettings {
    /// Codec offered to the encoder first (default: "vp9")
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Codec offered once if the first is rejected (default: "vp8")
    #[serde(default = "default_fallback_codec")]
    pub fallback_codec: Option<String>,

    /// Force a keyframe every N frames (default: 30)
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: u64,

    /// Target bitrate in bits per second (default: 5000000)
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// Quality hint in 0.0..=1.0, passed through to the encoder
    #[serde(default)]
    pub quality: Option<f32>,

    /// Frames allowed inside the encoder before submissions wait (default: 10)
    #[serde(default = "default_max_pending_frames")]
    pub max_pending_frames: usize,
}

fn default_codec() -> String {
    "vp9".to_string()
}

fn default_fallback_codec() -> Option<String> {
    Some("vp8".to_string())
}

fn default_keyframe_interval() -> u64 {
    30
}

fn default_bitrate() -> u32 {
    5_000_000
}

fn default_max_pending_frames() -> usize {
    10
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            fallback_codec: default_fallback_codec(),
            keyframe_interval: default_keyframe_interval(),
            bitrate: default_bitrate(),
            quality: None,
            max_pending_frames: default_max_pending_frames(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MuxerSettings {
    /// Longest span of one cluster in milliseconds (default: 5000)
    #[serde(default = "default_cluster_duration")]
    pub cluster_duration_ms: u64,

    /// "backpatched" (default) or "unknown"
    #[serde(default)]
    pub segment_size: SegmentSize,

    /// Written as MuxingApp and WritingApp
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Initial output buffer allocation in bytes (default: 1024)
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

fn default_cluster_duration() -> u64 {
    MuxerOptions::default().cluster_duration_ms
}

fn default_app_name() -> String {
    MuxerOptions::default().app_name
}

fn default_initial_capacity() -> usize {
    MuxerOptions::default().initial_capacity
}

impl Default for MuxerSettings {
    fn default() -> Self {
        Self {
            cluster_duration_ms: default_cluster_duration(),
            segment_size: SegmentSize::default(),
            app_name: default_app_name(),
            initial_capacity: default_initial_capacity(),
        }
    }
}

impl From<&MuxerSettings> for MuxerOptions {
    fn from(settings: &MuxerSettings) -> Self {
        Self {
            cluster_duration_ms: settings.cluster_duration_ms,
            segment_size: settings.segment_size,
            app_name: settings.app_name.clone(),
            initial_capacity: settings.initial_capacity,
        }
    }
}
