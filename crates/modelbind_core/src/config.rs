//! Binding and engine configuration.

/// Options for the unmanaged → managed binding transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindOptions {
    /// Reuse an existing row with the same primary key instead of failing.
    pub update: bool,

    /// Skip writing properties that still hold their zero value.
    pub skip_defaults: bool,
}

impl BindOptions {
    /// Creates options with both flags off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            update: false,
            skip_defaults: false,
        }
    }

    /// Sets whether an existing row with the same primary key is updated.
    #[must_use]
    pub const fn update(mut self, value: bool) -> Self {
        self.update = value;
        self
    }

    /// Sets whether zero-valued properties are skipped.
    #[must_use]
    pub const fn skip_defaults(mut self, value: bool) -> Self {
        self.skip_defaults = value;
        self
    }
}

/// Configuration for [`MemoryEngine`](crate::MemoryEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether property writes are appended to the write log.
    pub record_writes: bool,

    /// Maximum number of write log entries kept (oldest dropped first).
    pub max_write_log: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            record_writes: true,
            max_write_log: 10_000,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether writes are recorded.
    #[must_use]
    pub const fn record_writes(mut self, value: bool) -> Self {
        self.record_writes = value;
        self
    }

    /// Sets the write log capacity.
    #[must_use]
    pub const fn max_write_log(mut self, size: usize) -> Self {
        self.max_write_log = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_options() {
        let options = BindOptions::default();
        assert!(!options.update);
        assert!(!options.skip_defaults);
        assert_eq!(options, BindOptions::new());
    }

    #[test]
    fn builder_pattern() {
        let options = BindOptions::new().update(true).skip_defaults(true);
        assert!(options.update);
        assert!(options.skip_defaults);

        let config = EngineConfig::new().record_writes(false).max_write_log(16);
        assert!(!config.record_writes);
        assert_eq!(config.max_write_log, 16);
    }
}
