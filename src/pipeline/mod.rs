pub mod context;
pub mod encoder;
pub mod executor;
pub mod passthrough;

pub use context::{ProgressSender, Stage};
pub use encoder::{ChunkSink, EncodeOptions, Encoder, EncoderConfig, RawFrame};
pub use executor::{MuxingPipeline, PipelineConfig, PipelineState, PipelineStats};
pub use passthrough::PassthroughEncoder;
