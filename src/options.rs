//! Configuration options for segwal.

use crate::segment::{BLOCK_SIZE, CHUNK_HEADER_SIZE};

/// Default segment file extension.
pub const DEFAULT_SEGMENT_FILE_EXT: &str = ".SEG";

/// Default maximum segment size (1GB).
pub const DEFAULT_SEGMENT_SIZE: u64 = 1024 * 1024 * 1024;

/// Default block cache size (10 blocks, 320KB).
pub const DEFAULT_BLOCK_CACHE_SIZE: u64 = 10 * BLOCK_SIZE as u64;

/// WAL sync mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Sync after every single write (safest, slowest).
    Always,
    /// Sync once this many bytes have been written since the last sync.
    Bytes {
        /// Number of bytes before sync.
        bytes: u64,
    },
    /// Let the OS decide when to sync (fastest, may lose recent writes on crash).
    #[default]
    None,
}

/// WAL configuration options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Extension of segment files, must start with `.`.
    pub segment_file_ext: String,

    /// Maximum size of one segment file before rotation.
    pub segment_size: u64,

    /// Block cache budget in bytes (0 to disable).
    pub block_cache_size: u64,

    /// Sync policy applied after single writes.
    pub sync_mode: SyncMode,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            segment_file_ext: DEFAULT_SEGMENT_FILE_EXT.to_string(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            block_cache_size: DEFAULT_BLOCK_CACHE_SIZE,
            sync_mode: SyncMode::default(),
        }
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        validate_file_ext(&self.segment_file_ext)?;

        if self.segment_size <= CHUNK_HEADER_SIZE as u64 {
            return Err(crate::Error::invalid_config(format!(
                "segment_size must be larger than {} bytes",
                CHUNK_HEADER_SIZE
            )));
        }

        if self.block_cache_size > self.segment_size {
            return Err(crate::Error::invalid_config(
                "block_cache_size must not exceed segment_size",
            ));
        }

        Ok(())
    }

    /// Number of whole blocks the block cache may hold (0 disables it).
    pub fn block_cache_capacity(&self) -> usize {
        let block = BLOCK_SIZE as u64;
        ((self.block_cache_size + block - 1) / block) as usize
    }
}

/// Check that a segment file extension starts with `.`.
pub(crate) fn validate_file_ext(ext: &str) -> crate::Result<()> {
    if !ext.starts_with('.') {
        return Err(crate::Error::invalid_config(
            "segment file extension must start with '.'",
        ));
    }
    Ok(())
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the segment file extension.
    pub fn segment_file_ext(mut self, ext: impl Into<String>) -> Self {
        self.options.segment_file_ext = ext.into();
        self
    }

    /// Set the maximum segment size.
    pub fn segment_size(mut self, size: u64) -> Self {
        self.options.segment_size = size;
        self
    }

    /// Set block cache size.
    pub fn block_cache_size(mut self, size: u64) -> Self {
        self.options.block_cache_size = size;
        self
    }

    /// Set sync mode.
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.options.sync_mode = mode;
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.segment_file_ext, ".SEG");
        assert_eq!(opts.segment_size, DEFAULT_SEGMENT_SIZE);
        assert_eq!(opts.sync_mode, SyncMode::None);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        opts.segment_file_ext = "SEG".into();
        assert!(opts.validate().is_err());

        let mut opts = Options::default();
        opts.segment_size = 4;
        assert!(opts.validate().is_err());

        let mut opts = Options::default();
        opts.segment_size = 64 * 1024;
        opts.block_cache_size = 128 * 1024;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_block_cache_capacity() {
        let mut opts = Options::default();
        assert_eq!(opts.block_cache_capacity(), 10);

        opts.block_cache_size = 0;
        assert_eq!(opts.block_cache_capacity(), 0);

        opts.block_cache_size = BLOCK_SIZE as u64 + 1;
        assert_eq!(opts.block_cache_capacity(), 2);

        opts.block_cache_size = 1;
        assert_eq!(opts.block_cache_capacity(), 1);
    }

    #[test]
    fn test_options_builder() {
        let opts = OptionsBuilder::new()
            .segment_file_ext(".wal")
            .segment_size(64 * 1024)
            .block_cache_size(0)
            .sync_mode(SyncMode::Bytes { bytes: 4096 })
            .build()
            .unwrap();

        assert_eq!(opts.segment_file_ext, ".wal");
        assert_eq!(opts.segment_size, 64 * 1024);
        assert_eq!(opts.sync_mode, SyncMode::Bytes { bytes: 4096 });

        assert!(OptionsBuilder::new().segment_file_ext("wal").build().is_err());
    }
}
