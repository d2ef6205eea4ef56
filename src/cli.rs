use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webmux")]
#[command(author, version, about = "Mux encoded frames into WebM documents")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the element tree of a WebM file
    Inspect {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mux a synthetic test pattern through the passthrough encoder
    Demo {
        /// Where to write the WebM document
        #[arg(short, long)]
        output: PathBuf,

        /// Number of frames to generate
        #[arg(long, default_value = "90")]
        frames: u64,

        /// Frame width (defaults to the configured width)
        #[arg(long)]
        width: Option<u32>,

        /// Frame height (defaults to the configured height)
        #[arg(long)]
        height: Option<u32>,

        /// Frames per second (defaults to the configured rate)
        #[arg(long)]
        fps: Option<f64>,
    },

    /// Validate configuration and print warnings
    CheckConfig,

    /// Display version information
    Version,
}
