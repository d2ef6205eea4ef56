//! Progress reporting shared by the pipeline and its muxing task.

use std::fmt;

/// Coarse phase of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initializing,
    Encoding,
    Muxing,
    Finalizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::Encoding => "encoding",
            Stage::Muxing => "muxing",
            Stage::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sender for reporting progress out of the pipeline.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and
/// the current [`Stage`]. The callback may be invoked from any thread,
/// including the blocking muxing task.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, Stage) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, Stage) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress, clamped to 0..=100.
    pub fn send(&self, progress: f32, stage: Stage) {
        (self.callback)(progress.clamp(0.0, 100.0), stage);
    }
}

impl Default for ProgressSender {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}
