//! Engine configuration

/// Default number of bucket bits of a new member table (8 buckets)
pub const DEFAULT_INITIAL_BUCKET_BITS: u32 = 3;

/// Default load, in percent of the bucket count, above which a table rehashes
pub const DEFAULT_MAX_LOAD_PERCENT: u32 = 75;

/// Default indentation unit of structured-data output
pub const DEFAULT_STRUCTURED_INDENT: &str = " ";

/// Default length budget of human-readable renderings
pub const DEFAULT_HUMAN_READABLE_LEN: usize = 64;

/// Sizing of member tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberTableConfig {
    /// log2 of the initial bucket count
    pub initial_bucket_bits: u32,
    /// Live symbols per 100 buckets allowed before the table doubles
    pub max_load_percent: u32,
}

impl MemberTableConfig {
    /// Initial bucket count
    #[inline]
    pub fn initial_buckets(&self) -> usize {
        1usize << self.initial_bucket_bits.min(30)
    }
}

impl Default for MemberTableConfig {
    fn default() -> Self {
        MemberTableConfig {
            initial_bucket_bits: DEFAULT_INITIAL_BUCKET_BITS,
            max_load_percent: DEFAULT_MAX_LOAD_PERCENT,
        }
    }
}

/// Configuration of an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Sizing of every member table the engine creates
    pub member_table: MemberTableConfig,
    /// Indentation unit used when saving structured data
    pub structured_indent: String,
    /// Maximum length of human-readable value renderings
    pub human_readable_len: usize,
    /// Stack size of threads spawned by the Thread and Coroutine classes
    pub thread_stack_size: Option<usize>,
}

impl EngineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        EngineConfig {
            member_table: MemberTableConfig::default(),
            structured_indent: DEFAULT_STRUCTURED_INDENT.to_string(),
            human_readable_len: DEFAULT_HUMAN_READABLE_LEN,
            thread_stack_size: None,
        }
    }

    pub fn with_member_table(mut self, member_table: MemberTableConfig) -> Self {
        self.member_table = member_table;
        self
    }

    pub fn with_structured_indent(mut self, indent: &str) -> Self {
        self.structured_indent = indent.to_string();
        self
    }

    pub fn with_human_readable_len(mut self, len: usize) -> Self {
        self.human_readable_len = len;
        self
    }

    pub fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = Some(size);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.member_table.initial_buckets(), 8);
        assert_eq!(config.member_table.max_load_percent, 75);
        assert_eq!(config.structured_indent, " ");
        assert!(config.thread_stack_size.is_none());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_member_table(MemberTableConfig {
                initial_bucket_bits: 1,
                max_load_percent: 100,
            })
            .with_structured_indent("  ")
            .with_thread_stack_size(1 << 20);
        assert_eq!(config.member_table.initial_buckets(), 2);
        assert_eq!(config.structured_indent, "  ");
        assert_eq!(config.thread_stack_size, Some(1 << 20));
    }
}
