//! Webmux - encode raw frames and mux them into WebM
//!
//! This library crate exposes the pipeline for the CLI and for integration
//! testing. Container work lives in `webmux-media`.

pub mod config;
pub mod error;
pub mod pipeline;

pub use error::{Error, Result};
pub use pipeline::{MuxingPipeline, PipelineConfig, PipelineState, PipelineStats};
