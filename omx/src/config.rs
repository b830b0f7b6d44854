//! Container configuration

use omx_core::{ChunkBudget, CompressionLevel};

/// Settings applied when a container creates new datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerConfig {
    /// Compression used when a matrix or reference is added without one
    pub default_compression: CompressionLevel,
    /// Ideal chunk sizes in bytes for the chunk-shape policy
    pub chunk_budget: ChunkBudget,
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression used when none is given
    pub fn with_default_compression(mut self, compression: CompressionLevel) -> Self {
        self.default_compression = compression;
        self
    }

    /// Set the ideal chunk sizes
    pub fn with_chunk_budget(mut self, chunk_budget: ChunkBudget) -> Self {
        self.chunk_budget = chunk_budget;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ContainerConfig::new();
        assert_eq!(config.default_compression, CompressionLevel::NoCompression);
        assert_eq!(config.chunk_budget.uncompressed, 256_000);
        assert_eq!(config.chunk_budget.compressed, 320_000);

        let config = config
            .with_default_compression(CompressionLevel::Level4)
            .with_chunk_budget(ChunkBudget {
                uncompressed: 1024,
                compressed: 4096,
            });
        assert_eq!(config.default_compression, CompressionLevel::Level4);
        assert_eq!(config.chunk_budget.for_level(CompressionLevel::Level4), 4096);
    }
}
