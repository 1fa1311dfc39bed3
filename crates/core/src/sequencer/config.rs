//! Sequencer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard ceiling for automatic conflict retries.
pub const MAX_CONFLICT_RETRIES: u32 = 3;

/// Configuration for the page sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Upper bound for every individual store call (milliseconds).
    /// Expiry is reported as `StoreUnavailable`.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Automatic re-runs after a page-number conflict (0..=3).
    #[serde(default = "default_conflict_retries")]
    pub max_conflict_retries: u32,

    /// When uploads to the same chapter take turns in-process.
    #[serde(default)]
    pub chapter_turns: ChapterTurns,

    /// Largest batch accepted in one upload.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// How stored image references are derived from submitted files.
    #[serde(default)]
    pub image_naming: ImageNaming,
}

fn default_store_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_conflict_retries() -> u32 {
    1
}

fn default_max_batch_size() -> usize {
    500
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout(),
            max_conflict_retries: default_conflict_retries(),
            chapter_turns: ChapterTurns::default(),
            max_batch_size: default_max_batch_size(),
            image_naming: ImageNaming::default(),
        }
    }
}

impl SequencerConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Total attempts an upload may make, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_conflict_retries.min(MAX_CONFLICT_RETRIES) + 1
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_chapter_turns(mut self, turns: ChapterTurns) -> Self {
        self.chapter_turns = turns;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_image_naming(mut self, naming: ImageNaming) -> Self {
        self.image_naming = naming;
        self
    }
}

/// Per-chapter serialization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterTurns {
    /// Take turns only when the store cannot insert a batch atomically.
    #[default]
    Auto,
    /// Always take turns, even with atomic stores.
    Always,
}

/// Image reference naming mode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ImageNaming {
    /// Store the submitted file reference unchanged.
    #[default]
    Passthrough,
    /// `{base_url}/chapter-{chapter_id}-page-{n}.{ext}`
    Templated { base_url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SequencerConfig::default();
        assert_eq!(config.store_timeout_ms, 10_000);
        assert_eq!(config.max_conflict_retries, 1);
        assert_eq!(config.chapter_turns, ChapterTurns::Auto);
        assert_eq!(config.max_batch_size, 500);
        assert_eq!(config.image_naming, ImageNaming::Passthrough);
        assert_eq!(config.max_attempts(), 2);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: SequencerConfig = toml::from_str("max_conflict_retries = 0").unwrap();
        assert_eq!(config.max_conflict_retries, 0);
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.store_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_max_attempts_clamped_to_ceiling() {
        let config = SequencerConfig::default().with_conflict_retries(50);
        assert_eq!(config.max_attempts(), MAX_CONFLICT_RETRIES + 1);
    }

    #[test]
    fn test_builder() {
        let config = SequencerConfig::default()
            .with_store_timeout(Duration::from_millis(250))
            .with_chapter_turns(ChapterTurns::Always)
            .with_max_batch_size(10)
            .with_image_naming(ImageNaming::Templated {
                base_url: "https://cdn.example.com".to_string(),
            });

        assert_eq!(config.store_timeout_ms, 250);
        assert_eq!(config.chapter_turns, ChapterTurns::Always);
        assert_eq!(config.max_batch_size, 10);
        assert!(matches!(config.image_naming, ImageNaming::Templated { .. }));
    }

    #[test]
    fn test_huge_store_timeout_saturates() {
        let config = SequencerConfig::default().with_store_timeout(Duration::MAX);
        assert_eq!(config.store_timeout_ms, u64::MAX);
    }
}
