use pipeflow_pipe::{Pipe, DEFAULT_CAPACITY, DEFAULT_QUEUE_DEPTH};
use serde::{Deserialize, Serialize};

/// Pipe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipeConfig {
    /// Number of rows collected before a batch is handed to the consumer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Number of batches queued before the producer blocks. Set to 0
    /// for an unbounded queue.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_buffer_size() -> usize {
    DEFAULT_CAPACITY
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            queue_size: default_queue_size(),
        }
    }
}

impl PipeConfig {
    pub fn build(&self) -> Pipe {
        Pipe::new(self.buffer_size, self.queue_size)
    }
}

/// Pipe settings of a single connection. Unset fields keep the
/// stream-wide value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipeOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
}

impl PipeOverride {
    /// Merge field by field over `base`.
    pub fn apply(&self, base: PipeConfig) -> PipeConfig {
        PipeConfig {
            buffer_size: self.buffer_size.unwrap_or(base.buffer_size),
            queue_size: self.queue_size.unwrap_or(base.queue_size),
        }
    }
}
