mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;
use webmux_media::{AudioTrackConfig, Codec, TrackConfig};

use crate::pipeline::PipelineConfig;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(config)
}

/// Load config from the given path, `./webmux.toml`, or defaults
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_path = Path::new("./webmux.toml");
    if default_path.exists() {
        return load_config(default_path);
    }

    Ok(Config::default())
}

impl Config {
    /// Parse a JSON document with the same layout as the TOML file.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::config(format!("invalid JSON config: {e}")))
    }

    /// Problems that do not stop a pipeline from being built but are
    /// probably mistakes.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            warnings.push(format!(
                "Odd video dimensions {}x{} are rejected by most VP8/VP9 encoders",
                self.video.width, self.video.height
            ));
        }
        if self.encoder.keyframe_interval as f64 > self.video.frame_rate * 10.0 {
            warnings.push(format!(
                "Keyframe interval of {} frames is over 10 seconds at {} fps",
                self.encoder.keyframe_interval, self.video.frame_rate
            ));
        }
        if self.muxer.cluster_duration_ms > 30_000 {
            warnings.push(format!(
                "Cluster duration {}ms exceeds the 32s reach of block timecodes",
                self.muxer.cluster_duration_ms
            ));
        }
        if let Some(quality) = self.encoder.quality {
            if !(0.0..=1.0).contains(&quality) {
                warnings.push(format!("Quality {} is outside 0.0..=1.0", quality));
            }
        }
        if let Some(fallback) = &self.encoder.fallback_codec {
            if fallback.eq_ignore_ascii_case(&self.encoder.codec) {
                warnings.push("Fallback codec is the same as the primary codec".to_string());
            }
        }
        if self.expected_frames == Some(0) {
            warnings.push("expected_frames is 0; progress will not be reported".to_string());
        }

        warnings
    }

    /// Build a strongly-typed [`PipelineConfig`].
    ///
    /// Unknown codec names fail with `UnsupportedCodec`; values the muxer
    /// cannot work with fail with `Config`.
    pub fn pipeline_config(&self) -> crate::Result<PipelineConfig> {
        let codec = parse_codec(&self.encoder.codec)?;
        if !codec.is_video() {
            return Err(crate::Error::config(format!(
                "encoder codec {codec} is not a video codec"
            )));
        }
        let video = TrackConfig::video(
            codec,
            self.video.width,
            self.video.height,
            self.video.frame_rate,
        )
        .with_track_number(self.video.track_number);
        video
            .validate()
            .map_err(|e| crate::Error::config(e.to_string()))?;

        let mut pipeline = PipelineConfig::new(video)
            .with_keyframe_interval(self.encoder.keyframe_interval)
            .with_muxer_options((&self.muxer).into());
        pipeline.bitrate = self.encoder.bitrate;
        pipeline.quality = self.encoder.quality;
        pipeline.max_pending_frames = self.encoder.max_pending_frames;
        pipeline.expected_frames = self.expected_frames;
        pipeline.validate()?;

        if let Some(fallback) = &self.encoder.fallback_codec {
            pipeline = pipeline.with_fallback_codec(parse_codec(fallback)?);
        }

        if self.audio.enabled {
            let audio_codec = parse_codec(&self.audio.codec)?;
            let mut audio =
                AudioTrackConfig::new(audio_codec, self.audio.sample_rate, self.audio.channels);
            audio.track_number = self.audio.track_number;
            audio
                .validate()
                .map_err(|e| crate::Error::config(e.to_string()))?;
            pipeline = pipeline.with_audio(audio);
        }

        Ok(pipeline)
    }
}

fn parse_codec(name: &str) -> crate::Result<Codec> {
    name.parse()
        .map_err(|_| crate::Error::UnsupportedCodec(name.to_string()))
}
