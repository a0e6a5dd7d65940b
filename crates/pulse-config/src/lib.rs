use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PULSE_DIR_NAME: &str = ".pulse";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATABASE_FILE_NAME: &str = "pulse.sqlite";

pub const DEFAULT_INTERVAL_DAYS: u32 = 100;
pub const DEFAULT_INTERVAL_COUNT: u32 = 32;
pub const DEFAULT_COMMIT_CAP: u64 = 300;
pub const DEFAULT_MIN_WINDOW_SECS: i64 = 60 * 60;
pub const DEFAULT_UPLOC_GRACE_DAYS: u32 = 21;
pub const DEFAULT_COLLABORATION_WINDOW_DAYS: u32 = 21;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PulseConfig {
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
    #[serde(default = "default_commit_cap")]
    pub commit_cap: u64,
    #[serde(default = "default_min_window_secs")]
    pub min_window_secs: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            interval_days: default_interval_days(),
            interval_count: default_interval_count(),
            commit_cap: default_commit_cap(),
            min_window_secs: default_min_window_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_uploc_grace_days")]
    pub uploc_grace_days: u32,
    #[serde(default = "default_collaboration_window_days")]
    pub collaboration_window_days: u32,
    #[serde(default = "default_new_code_min_loc")]
    pub new_code_min_loc: i64,
    #[serde(default = "default_new_code_min_ratio")]
    pub new_code_min_ratio: f64,
    #[serde(default = "default_min_hours")]
    pub min_hours: f64,
    #[serde(default = "default_max_hours")]
    pub max_hours: f64,
    #[serde(default = "default_baseline_min_hours")]
    pub baseline_min_hours: f64,
    #[serde(default = "default_baseline_max_hours")]
    pub baseline_max_hours: f64,
    #[serde(default = "default_outlier_patch_loc")]
    pub outlier_patch_loc: Option<i64>,
    #[serde(default = "default_bugfix_keywords")]
    pub bugfix_keywords: Vec<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            uploc_grace_days: default_uploc_grace_days(),
            collaboration_window_days: default_collaboration_window_days(),
            new_code_min_loc: default_new_code_min_loc(),
            new_code_min_ratio: default_new_code_min_ratio(),
            min_hours: default_min_hours(),
            max_hours: default_max_hours(),
            baseline_min_hours: default_baseline_min_hours(),
            baseline_max_hours: default_baseline_max_hours(),
            outlier_patch_loc: default_outlier_patch_loc(),
            bugfix_keywords: default_bugfix_keywords(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_filler_tokens")]
    pub filler_tokens: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            lock_timeout_ms: default_lock_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            filler_tokens: default_filler_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn pulse_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(PULSE_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    pulse_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn database_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    pulse_dir(workspace_root).join(DATABASE_FILE_NAME)
}

pub fn load_workspace_config(workspace_root: impl AsRef<Path>) -> Result<PulseConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(PulseConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PulseConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<PulseConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(pulse_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = PulseConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

/// Reports settings that are accepted but probably not what the operator
/// intended. Hard errors are repaired by `normalize_config` instead.
pub fn validate_config(config: &PulseConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let metrics = &config.metrics;

    if metrics.min_hours > metrics.max_hours {
        warnings.push(ConfigWarning {
            code: "hours_bounds_inverted",
            message: format!(
                "metrics.min_hours ({}) exceeds metrics.max_hours ({}); every commit will be clamped to max_hours",
                metrics.min_hours, metrics.max_hours
            ),
        });
    }

    if metrics.baseline_min_hours >= metrics.baseline_max_hours {
        warnings.push(ConfigWarning {
            code: "baseline_range_empty",
            message: "metrics.baseline_min_hours is not below baseline_max_hours; no author velocity baseline can be computed".to_owned(),
        });
    }

    if metrics.bugfix_keywords.is_empty() {
        warnings.push(ConfigWarning {
            code: "bugfix_keywords_empty",
            message: "metrics.bugfix_keywords is empty; only conventional `fix:` labels mark bugfix commits".to_owned(),
        });
    }

    let horizon_days = u64::from(config.windows.interval_days)
        * u64::from(config.windows.interval_count);
    if horizon_days < u64::from(metrics.uploc_grace_days) {
        warnings.push(ConfigWarning {
            code: "horizon_shorter_than_grace",
            message: format!(
                "analysis horizon of {horizon_days} days is shorter than the UPLOC grace period"
            ),
        });
    }

    warnings
}

fn normalize_config(mut config: PulseConfig) -> PulseConfig {
    let defaults = PulseConfig::default();

    if config.windows.interval_days == 0 {
        config.windows.interval_days = defaults.windows.interval_days;
    }
    if config.windows.interval_count == 0 {
        config.windows.interval_count = defaults.windows.interval_count;
    }
    if config.windows.commit_cap == 0 {
        config.windows.commit_cap = defaults.windows.commit_cap;
    }
    config.windows.min_window_secs = config.windows.min_window_secs.max(1);

    let metrics = &mut config.metrics;
    if !metrics.new_code_min_ratio.is_finite() || metrics.new_code_min_ratio < 0.0 {
        metrics.new_code_min_ratio = defaults.metrics.new_code_min_ratio;
    }
    if !metrics.min_hours.is_finite() || metrics.min_hours <= 0.0 {
        metrics.min_hours = defaults.metrics.min_hours;
    }
    if !metrics.max_hours.is_finite() || metrics.max_hours <= 0.0 {
        metrics.max_hours = defaults.metrics.max_hours;
    }
    metrics.outlier_patch_loc = metrics.outlier_patch_loc.filter(|value| *value > 0);
    metrics.bugfix_keywords = normalize_words(std::mem::take(&mut metrics.bugfix_keywords));

    let identity = &mut config.identity;
    if !identity.similarity_threshold.is_finite() {
        identity.similarity_threshold = defaults.identity.similarity_threshold;
    }
    identity.similarity_threshold = identity.similarity_threshold.clamp(0.0, 1.0);
    identity.filler_tokens = normalize_words(std::mem::take(&mut identity.filler_tokens));

    config
}

fn normalize_words(words: Vec<String>) -> Vec<String> {
    let mut normalized = words
        .into_iter()
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>();
    normalized.sort();
    normalized.dedup();
    normalized
}

fn default_interval_days() -> u32 {
    DEFAULT_INTERVAL_DAYS
}

fn default_interval_count() -> u32 {
    DEFAULT_INTERVAL_COUNT
}

fn default_commit_cap() -> u64 {
    DEFAULT_COMMIT_CAP
}

fn default_min_window_secs() -> i64 {
    DEFAULT_MIN_WINDOW_SECS
}

fn default_uploc_grace_days() -> u32 {
    DEFAULT_UPLOC_GRACE_DAYS
}

fn default_collaboration_window_days() -> u32 {
    DEFAULT_COLLABORATION_WINDOW_DAYS
}

fn default_new_code_min_loc() -> i64 {
    10
}

fn default_new_code_min_ratio() -> f64 {
    2.0
}

fn default_min_hours() -> f64 {
    1.0 / 12.0
}

fn default_max_hours() -> f64 {
    4.0
}

fn default_baseline_min_hours() -> f64 {
    0.001
}

fn default_baseline_max_hours() -> f64 {
    2.0
}

fn default_outlier_patch_loc() -> Option<i64> {
    Some(5_000)
}

fn default_bugfix_keywords() -> Vec<String> {
    ["bug", "bugfix", "fix", "fixed", "fixes", "fixing", "hotfix"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_filler_tokens() -> Vec<String> {
    ["dev", "github", "gmail", "mail", "noreply", "users"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}
