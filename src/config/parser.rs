use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Values supplied on the command line
///
/// Each `Some` field replaces the corresponding config-file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub start_url: Option<String>,
    pub max_pages: Option<u32>,
    pub concurrency: Option<u32>,
    pub delay_ms: Option<u64>,
    pub dry_run: bool,
    pub follow_item_pages: bool,
    pub primary_path: Option<String>,
    pub mirror_path: Option<String>,
}

/// Builds the effective configuration for a run
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
/// * `overrides` - Values given on the command line
///
/// Precedence is command line, then config file, then built-in defaults. The
/// merged result is validated once, after the overrides are applied.
pub fn resolve_config(path: Option<&Path>, overrides: &Overrides) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, overrides);
    validate(&config)?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, overrides: &Overrides) {
    if let Some(start) = &overrides.start_url {
        config.crawler.start_url = start.clone();
    }
    if let Some(max_pages) = overrides.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if let Some(delay_ms) = overrides.delay_ms {
        config.crawler.delay_ms = delay_ms;
    }
    if overrides.dry_run {
        config.crawler.dry_run = true;
    }
    if overrides.follow_item_pages {
        config.crawler.follow_item_pages = true;
    }
    if let Some(primary) = &overrides.primary_path {
        config.output.primary_path = primary.clone();
    }
    if let Some(mirror) = &overrides.mirror_path {
        config.output.mirror_path = mirror.clone();
    }
}

/// Computes a SHA-256 fingerprint of the settings that shape crawl output
///
/// Two runs with the same fingerprint traverse the same pages and write the
/// same record shape, so the second one is a pure resume of the first.
/// Budget, concurrency and timing settings are excluded.
pub fn settings_fingerprint(config: &Config) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.crawler.start_url.as_bytes());
    hasher.update([0u8]);
    hasher.update([
        config.crawler.follow_item_pages as u8,
        config.crawler.category_first as u8,
    ]);
    hasher.update(config.output.primary_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(config.output.mirror_path.as_bytes());
    hex::encode(hasher.finalize())
}
