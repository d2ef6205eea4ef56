//! Reference encoder that emits frame bytes unchanged.
//!
//! Useful for exercising the container path without a codec: the output is
//! a structurally valid WebM whose blocks hold raw pixels.

use async_trait::async_trait;
use parking_lot::Mutex;
use webmux_media::{Chunk, Codec};

use super::encoder::{ChunkSink, EncodeOptions, Encoder, EncoderConfig, RawFrame};
use crate::{Error, Result};

const NAME: &str = "passthrough";

#[derive(Debug, Default)]
pub struct PassthroughEncoder {
    accepted: Option<Vec<Codec>>,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    sink: Option<ChunkSink>,
    codec: Option<Codec>,
    closed: bool,
}

impl PassthroughEncoder {
    /// Accepts any codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts only `codecs`; anything else is rejected in `configure`.
    pub fn accepting(codecs: impl IntoIterator<Item = Codec>) -> Self {
        Self {
            accepted: Some(codecs.into_iter().collect()),
            state: Mutex::default(),
        }
    }

    /// Codec of the last successful `configure`.
    pub fn codec(&self) -> Option<Codec> {
        self.state.lock().codec
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl Encoder for PassthroughEncoder {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn configure(&self, config: &EncoderConfig, sink: ChunkSink) -> Result<()> {
        if let Some(accepted) = &self.accepted {
            if !accepted.contains(&config.codec) {
                return Err(Error::UnsupportedCodec(config.codec.to_string()));
            }
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::encoder(NAME, "encoder is closed"));
        }
        state.sink = Some(sink);
        state.codec = Some(config.codec);
        tracing::debug!(codec = %config.codec, width = config.width, height = config.height, "configured passthrough encoder");
        Ok(())
    }

    async fn encode(&self, frame: RawFrame, options: EncodeOptions) -> Result<()> {
        let sink = {
            let state = self.state.lock();
            if state.closed {
                return Err(Error::encoder(NAME, "encoder is closed"));
            }
            state
                .sink
                .clone()
                .ok_or_else(|| Error::encoder(NAME, "encode called before configure"))?
        };

        sink.push(Chunk::new(
            options.timestamp_micros,
            options.duration_micros,
            options.key_frame,
            frame.data,
        ));
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            state.sink = None;
            tracing::trace!("closed passthrough encoder");
        }
    }
}
