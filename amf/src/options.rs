pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Limits applied to a single top-level encode or decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Maximum number of nested arrays/objects. Back-references do not count, so cyclic graphs
    /// stay within the limit.
    pub max_depth: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
