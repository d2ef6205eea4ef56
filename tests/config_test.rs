mod common;

use std::io::Write;
use std::sync::Arc;

use common::block_times;
use tempfile::NamedTempFile;
use webmux::config::{load_config, load_config_or_default, Config};
use webmux::pipeline::{PassthroughEncoder, RawFrame};
use webmux::MuxingPipeline;
use webmux_media::{Codec, SegmentSize};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_toml_file() {
    let file = write_config(
        r#"
        [video]
        width = 320
        height = 240
        frame_rate = 25.0

        [encoder]
        codec = "vp8"
        fallback_codec = "vp9"
        keyframe_interval = 10

        [muxer]
        cluster_duration_ms = 1000
        segment_size = "unknown"
        app_name = "recorder"
        "#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.video.width, 320);
    assert_eq!(config.video.frame_rate, 25.0);
    assert_eq!(config.encoder.keyframe_interval, 10);
    assert_eq!(config.muxer.segment_size, SegmentSize::Unknown);
    assert!(!config.audio.enabled);

    let pipeline = config.pipeline_config().unwrap();
    assert_eq!(pipeline.video.codec, Codec::Vp8);
    assert_eq!(pipeline.fallback_codec, Some(Codec::Vp9));
    assert_eq!(pipeline.muxer.app_name, "recorder");
    assert_eq!(pipeline.muxer.cluster_duration_ms, 1000);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let file = write_config("[video\nwidth = ");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_missing_file_is_an_error() {
    let err = load_config(std::path::Path::new("/nonexistent/webmux.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_explicit_path_wins() {
    let file = write_config("[video]\nwidth = 160\nheight = 120\n");
    let config = load_config_or_default(Some(file.path())).unwrap();
    assert_eq!(config.video.width, 160);
}

#[test]
fn test_unknown_codec_in_file() {
    let file = write_config("[encoder]\ncodec = \"h264\"\n");
    let config = load_config(file.path()).unwrap();
    assert!(matches!(
        config.pipeline_config(),
        Err(webmux::Error::UnsupportedCodec(name)) if name == "h264"
    ));
}

#[test]
fn test_pipeline_from_config() {
    let file = write_config(
        r#"
        [video]
        width = 16
        height = 16
        frame_rate = 10.0

        [encoder]
        codec = "vp8"
        keyframe_interval = 5

        [muxer]
        cluster_duration_ms = 1000
        "#,
    );
    let config: Config = load_config(file.path()).unwrap();
    let pipeline = MuxingPipeline::new(
        config.pipeline_config().unwrap(),
        Arc::new(PassthroughEncoder::new()),
    );

    // 25 frames at 10 fps span 2.4s, so more than one cluster at 1s each.
    let doc = tokio_test::block_on(async {
        pipeline.initialize().await.unwrap();
        for i in 0..25u8 {
            pipeline
                .submit(RawFrame::new(16, 16, vec![i; 4]))
                .await
                .unwrap();
        }
        pipeline.finalize().await.unwrap()
    });

    let blocks = block_times(&doc);
    assert_eq!(blocks.len(), 25);
    let keyframes: Vec<i64> = blocks.iter().filter(|b| b.2).map(|b| b.1).collect();
    assert_eq!(keyframes, vec![0, 500, 1000, 1500, 2000]);
    assert!(common::count_elements(&doc, webmux_media::ebml::ids::CLUSTER) > 1);
}
