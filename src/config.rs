/// Per-segment limits: when either is reached the segment is "maxed" and
/// the log rolls a new one over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentConfig {
    pub max_store_bytes: u64,
    pub max_index_bytes: u64,
    pub initial_offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub segment: SegmentConfig,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new(0, 0, 0).build()
    }
}

/// Builds a [`Config`], substituting the documented defaults for any
/// zero value so the rest of the crate never has to special-case "0
/// means unset".
pub struct ConfigBuilder {
    max_store_bytes: u64,
    max_index_bytes: u64,
    initial_offset: u64,
}

const DEFAULT_MAX_STORE_BYTES: u64 = 1024;
const DEFAULT_MAX_INDEX_BYTES: u64 = 1024;

impl ConfigBuilder {
    pub fn new(max_store_bytes: u64, max_index_bytes: u64, initial_offset: u64) -> Self {
        Self {
            max_store_bytes,
            max_index_bytes,
            initial_offset,
        }
    }

    pub fn build(self) -> Config {
        Config {
            segment: SegmentConfig {
                max_store_bytes: if self.max_store_bytes == 0 {
                    DEFAULT_MAX_STORE_BYTES
                } else {
                    self.max_store_bytes
                },
                max_index_bytes: if self.max_index_bytes == 0 {
                    DEFAULT_MAX_INDEX_BYTES
                } else {
                    self.max_index_bytes
                },
                initial_offset: self.initial_offset,
            },
        }
    }
}
