//! Configuration for the history system.

/// Maximum number of committed transactions kept in history.
/// The oldest transaction is evicted when this limit is exceeded.
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 999;

/// Configuration for the history system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Max committed transactions kept for undo/redo.
    pub max_history_length: usize,
    /// Whether the manager records and replays at all.
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            enabled: true,
        }
    }
}

impl HistoryConfig {
    /// A config with the given history bound and recording enabled.
    pub fn with_max_history_length(max_history_length: usize) -> Self {
        Self {
            max_history_length,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_history_length, 999);
        assert!(config.enabled);
    }

    #[test]
    fn test_with_max_history_length() {
        let config = HistoryConfig::with_max_history_length(3);
        assert_eq!(config.max_history_length, 3);
        assert!(config.enabled);
    }
}
