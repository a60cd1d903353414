use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::common::error::Result;

/// Run-level tuning knobs, loaded from an optional `config.toml`.
/// Every field has a default so the scraper runs without one.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub crawler: CrawlerConfig,
    pub retry: RetryConfig,
    pub normalize: NormalizeConfig,
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of sites crawled concurrently.
    pub concurrency: usize,
    /// Per-page navigation timeout.
    pub page_timeout_secs: u64,
    /// Randomized pause before each fetch, drawn uniformly from this range.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            page_timeout_secs: 30,
            min_delay_ms: 2000,
            max_delay_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_attempts: 3,
            jitter_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Divide prices above the threshold by 100 on sites flagged as quoting
    /// minor units (millimes). An approximation: legitimately expensive
    /// items on those sites will be scaled down too.
    pub minor_unit_correction: bool,
    pub minor_unit_threshold: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            minor_unit_correction: true,
            minor_unit_threshold: crate::pipeline::normalize::price::MINOR_UNIT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Relative price tolerance when comparing near-duplicate candidates.
    pub price_tolerance: f64,
    /// Title similarity ratio at or above which two records collapse.
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            price_tolerance: 0.01,
            similarity_threshold: 0.85,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reads `config.toml` when present, otherwise returns defaults.
    pub fn load_or_default() -> Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RunConfig::default();
        assert!(config.crawler.concurrency >= 1);
        assert!(config.crawler.min_delay_ms <= config.crawler.max_delay_ms);
        assert!(config.retry.max_attempts >= 1);
        assert!(config.normalize.minor_unit_correction);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_sections() {
        let config: RunConfig = toml::from_str(
            r#"
            [crawler]
            concurrency = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.crawler.concurrency, 4);
        assert_eq!(config.retry.max_attempts, RetryConfig::default().max_attempts);
        assert_eq!(config.dedup.similarity_threshold, 0.85);
    }
}
