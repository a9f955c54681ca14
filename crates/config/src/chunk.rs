//! Limits for splitting oversized payloads.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Chunking limits applied to chunked transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Maximum payload bytes carried by one chunk.
    pub chunk_size: usize,
    /// Maximum number of chunks one payload may be split into.
    pub max_chunks: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 1024, max_chunks: 20 }
    }
}

impl ChunkConfig {
    /// Reject zero sizes.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Zero("chunk_size"));
        }
        if self.max_chunks == 0 {
            return Err(ConfigError::Zero("max_chunks"));
        }
        Ok(())
    }
}
