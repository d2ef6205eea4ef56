mod cli;

use webmux::config;
use webmux::pipeline::{MuxingPipeline, PassthroughEncoder, ProgressSender, RawFrame};
use webmux_media::ebml::{inspect, ElementValue};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "webmux=trace,webmux_media=debug".to_string()
        } else {
            "webmux=info,webmux_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { file, json } => inspect_file(&file, json),
        Commands::Demo {
            output,
            frames,
            width,
            height,
            fps,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_demo(
                cli.config.as_deref(),
                &output,
                DemoOptions {
                    frames,
                    width,
                    height,
                    fps,
                },
            ))
        }
        Commands::CheckConfig => check_config(cli.config.as_deref()),
        Commands::Version => {
            println!("webmux {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn inspect_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let data = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let nodes = inspect(&data).with_context(|| format!("Failed to parse {:?}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    println!("File: {} ({} bytes)", file.display(), data.len());
    let mut clusters = 0;
    let mut blocks = 0;
    for node in &nodes {
        let indent = "  ".repeat(node.depth);
        let size = match node.header.size {
            Some(size) => size.to_string(),
            None => "unknown".to_string(),
        };
        let value = match &node.value {
            ElementValue::Master => String::new(),
            ElementValue::Uint(v) => format!(" = {}", v),
            ElementValue::Float(v) => format!(" = {}", v),
            ElementValue::String(s) => format!(" = {:?}", s),
            ElementValue::Block {
                track,
                relative_timecode,
                keyframe,
                len,
            } => {
                blocks += 1;
                format!(
                    " track {} @{:+}ms {} bytes{}",
                    track,
                    relative_timecode,
                    len,
                    if *keyframe { " [key]" } else { "" }
                )
            }
            ElementValue::Binary(len) => format!(" ({} bytes)", len),
        };
        if node.name == "Cluster" {
            clusters += 1;
        }
        println!(
            "{}{} [0x{:X}] @{} size {}{}",
            indent, node.name, node.header.id, node.header.offset, size, value
        );
    }
    println!("\nClusters: {}, blocks: {}", clusters, blocks);

    Ok(())
}

struct DemoOptions {
    frames: u64,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
}

async fn run_demo(config_path: Option<&Path>, output: &Path, options: DemoOptions) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(width) = options.width {
        config.video.width = width;
    }
    if let Some(height) = options.height {
        config.video.height = height;
    }
    if let Some(fps) = options.fps {
        config.video.frame_rate = fps;
    }
    config.expected_frames = Some(options.frames);

    let pipeline_config = config.pipeline_config()?;
    let (width, height) = (pipeline_config.video.width, pipeline_config.video.height);
    let pipeline = MuxingPipeline::new(pipeline_config, Arc::new(PassthroughEncoder::new()))
        .with_progress(ProgressSender::new(|pct, stage| {
            tracing::debug!("[{:.0}%] {}", pct, stage);
        }));

    pipeline.initialize().await?;
    tracing::info!(
        "Generating {} frames at {}x{} ({})",
        options.frames,
        width,
        height,
        pipeline
            .active_codec()
            .map(|c| c.to_string())
            .unwrap_or_default()
    );

    for index in 0..options.frames {
        pipeline
            .submit(RawFrame::new(width, height, test_pattern(width, height, index)))
            .await
            .with_context(|| format!("Failed to submit frame {}", index))?;
    }

    let document = pipeline.finalize().await?;
    std::fs::write(output, &document)
        .with_context(|| format!("Failed to write {:?}", output))?;

    let stats = pipeline.stats();
    println!("Wrote {} ({} bytes)", output.display(), document.len());
    println!("  Frames: {}", stats.frames_submitted);
    println!("  Chunks: {}", stats.chunks_collected);
    if let Some(avg) = stats.average_encode_time() {
        println!(
            "  Encode: {:.3} ms/frame avg, {:.3} ms max",
            avg.as_secs_f64() * 1000.0,
            stats.max_encode_time.as_secs_f64() * 1000.0
        );
    }

    Ok(())
}

/// Moving diagonal gradient, one luma byte per 8x8 block.
fn test_pattern(width: u32, height: u32, index: u64) -> Vec<u8> {
    let cols = width.div_ceil(8);
    let rows = height.div_ceil(8);
    let shift = (index % 256) as u32;
    (0..rows)
        .flat_map(|y| (0..cols).map(move |x| ((x + y + shift) % 256) as u8))
        .collect()
}

fn check_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using ./webmux.toml or defaults");
            config::load_config_or_default(None)?
        }
    };

    let warnings = config.validate();
    let pipeline = config.pipeline_config()?;

    println!("✓ Configuration is valid");
    println!(
        "  Video: {}x{} @ {} fps",
        pipeline.video.width, pipeline.video.height, pipeline.video.frame_rate
    );
    println!(
        "  Codec: {}{}",
        pipeline.video.codec,
        pipeline
            .fallback_codec
            .map(|c| format!(" (fallback {})", c))
            .unwrap_or_default()
    );
    println!("  Keyframe interval: {}", pipeline.keyframe_interval);
    match &pipeline.audio {
        Some(audio) => println!(
            "  Audio: {} {} Hz, {} ch",
            audio.codec, audio.sample_rate, audio.channels
        ),
        None => println!("  Audio: disabled"),
    }
    println!(
        "  Cluster duration: {} ms, segment size: {:?}",
        pipeline.muxer.cluster_duration_ms, pipeline.muxer.segment_size
    );

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    Ok(())
}
