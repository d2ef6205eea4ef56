//! Track descriptions written into the Tracks element.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Codecs this muxer can label a track with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialize",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum Codec {
    Vp8,
    Vp9,
    Av1,
    Opus,
    Vorbis,
}

impl Codec {
    /// Matroska CodecID string.
    pub fn matroska_id(&self) -> &'static str {
        match self {
            Codec::Vp8 => "V_VP8",
            Codec::Vp9 => "V_VP9",
            Codec::Av1 => "V_AV1",
            Codec::Opus => "A_OPUS",
            Codec::Vorbis => "A_VORBIS",
        }
    }

    /// Codec string in the form browser encoders accept.
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Codec::Vp8 => "vp8",
            Codec::Vp9 => "vp09.00.10.08",
            Codec::Av1 => "av01.0.04M.08",
            Codec::Opus => "opus",
            Codec::Vorbis => "vorbis",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Codec::Vp8 | Codec::Vp9 | Codec::Av1)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Vp8 => "VP8",
            Codec::Vp9 => "VP9",
            Codec::Av1 => "AV1",
            Codec::Opus => "Opus",
            Codec::Vorbis => "Vorbis",
        };
        f.write_str(name)
    }
}

impl FromStr for Codec {
    type Err = Error;

    /// Accepts bare names (`VP8`), encoder strings (`vp09.00.10.08`) and
    /// Matroska ids (`V_VP9`), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower
            .strip_prefix("v_")
            .or_else(|| lower.strip_prefix("a_"))
            .unwrap_or(&lower);

        match name {
            "vp8" => Ok(Codec::Vp8),
            "vp9" => Ok(Codec::Vp9),
            "av1" => Ok(Codec::Av1),
            "opus" => Ok(Codec::Opus),
            "vorbis" => Ok(Codec::Vorbis),
            n if n.starts_with("vp09") => Ok(Codec::Vp9),
            n if n.starts_with("av01") => Ok(Codec::Av1),
            _ => Err(Error::unsupported_codec(s)),
        }
    }
}

impl TryFrom<String> for Codec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Codec> for String {
    fn from(codec: Codec) -> Self {
        codec.to_string()
    }
}

/// Video track parameters, fixed for the lifetime of a document.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackConfig {
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    /// Frames per second.
    pub frame_rate: f64,
    pub track_number: u8,
}

impl TrackConfig {
    /// Video track number 1.
    pub fn video(codec: Codec, width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            codec,
            width,
            height,
            frame_rate,
            track_number: 1,
        }
    }

    pub fn with_track_number(mut self, track_number: u8) -> Self {
        self.track_number = track_number;
        self
    }

    /// Duration of one frame in microseconds.
    pub fn frame_duration_micros(&self) -> f64 {
        1_000_000.0 / self.frame_rate
    }

    /// DefaultDuration value: nanoseconds per frame.
    pub fn default_duration_ns(&self) -> u64 {
        (1_000_000_000.0 / self.frame_rate).round() as u64
    }

    pub fn validate(&self) -> Result<()> {
        if !self.codec.is_video() {
            return Err(Error::unsupported_codec(format!(
                "{} is not a video codec",
                self.codec
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_value(format!(
                "video dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(Error::invalid_value(format!(
                "frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        validate_track_number(self.track_number)
    }
}

/// Audio track parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioTrackConfig {
    pub codec: Codec,
    /// Samples per second.
    pub sample_rate: f64,
    pub channels: u8,
    pub track_number: u8,
}

impl AudioTrackConfig {
    /// Audio track number 2.
    pub fn new(codec: Codec, sample_rate: f64, channels: u8) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
            track_number: 2,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.codec.is_video() {
            return Err(Error::unsupported_codec(format!(
                "{} is not an audio codec",
                self.codec
            )));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(Error::invalid_value(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.channels == 0 {
            return Err(Error::invalid_value("audio track needs at least one channel"));
        }
        validate_track_number(self.track_number)
    }
}

/// Tracks of one document: exactly one video track, optionally one audio.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MuxerConfig {
    pub video: TrackConfig,
    pub audio: Option<AudioTrackConfig>,
}

impl MuxerConfig {
    pub fn video_only(video: TrackConfig) -> Self {
        Self { video, audio: None }
    }

    pub fn with_audio(mut self, audio: AudioTrackConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        if let Some(audio) = &self.audio {
            audio.validate()?;
            if audio.track_number == self.video.track_number {
                return Err(Error::invalid_value(format!(
                    "audio and video share track number {}",
                    audio.track_number
                )));
            }
        }
        Ok(())
    }
}

// Track numbers are written as a one-byte VINT inside every SimpleBlock.
fn validate_track_number(n: u8) -> Result<()> {
    if n == 0 || n > 126 {
        return Err(Error::invalid_value(format!(
            "track number must be in 1..=126, got {n}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_parsing() {
        assert_eq!("VP8".parse::<Codec>().unwrap(), Codec::Vp8);
        assert_eq!("vp8".parse::<Codec>().unwrap(), Codec::Vp8);
        assert_eq!("V_VP9".parse::<Codec>().unwrap(), Codec::Vp9);
        assert_eq!("vp09.00.10.08".parse::<Codec>().unwrap(), Codec::Vp9);
        assert_eq!("av01.0.04M.08".parse::<Codec>().unwrap(), Codec::Av1);
        assert_eq!("A_OPUS".parse::<Codec>().unwrap(), Codec::Opus);
        assert!(matches!(
            "avc1.640033".parse::<Codec>(),
            Err(Error::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(Codec::Vp8.matroska_id(), "V_VP8");
        assert_eq!(Codec::Vorbis.matroska_id(), "A_VORBIS");
        assert_eq!(Codec::Vp9.to_string(), "VP9");
        assert!(Codec::Av1.is_video());
        assert!(!Codec::Opus.is_video());
        assert_eq!(String::from(Codec::Vp8).parse::<Codec>().unwrap(), Codec::Vp8);
    }

    #[test]
    fn test_default_duration() {
        let track = TrackConfig::video(Codec::Vp8, 64, 64, 30.0);
        assert_eq!(track.default_duration_ns(), 33_333_333);
        assert_eq!(track.track_number, 1);
    }

    #[test]
    fn test_track_validation() {
        assert!(TrackConfig::video(Codec::Vp8, 64, 64, 30.0).validate().is_ok());
        assert!(TrackConfig::video(Codec::Opus, 64, 64, 30.0).validate().is_err());
        assert!(TrackConfig::video(Codec::Vp8, 0, 64, 30.0).validate().is_err());
        assert!(TrackConfig::video(Codec::Vp8, 64, 64, f64::NAN).validate().is_err());
        assert!(TrackConfig::video(Codec::Vp8, 64, 64, 30.0)
            .with_track_number(127)
            .validate()
            .is_err());
    }

    #[test]
    fn test_muxer_config_rejects_shared_track_number() {
        let mut audio = AudioTrackConfig::new(Codec::Opus, 48_000.0, 2);
        audio.track_number = 1;
        let config =
            MuxerConfig::video_only(TrackConfig::video(Codec::Vp9, 640, 360, 30.0)).with_audio(audio);
        assert!(matches!(config.validate(), Err(Error::InvalidValue(_))));
    }
}
