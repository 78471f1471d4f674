//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXPDF_CONFIG` (environment variable)
//! 2. `~/.config/mboxpdf/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxpdf\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Renderer process and retry policy.
    pub render: RenderConfig,
    /// Scheduling of message tasks.
    pub pipeline: PipelineConfig,
    /// Default input discovery.
    pub discovery: DiscoveryConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Renderer process and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Path to a Chromium/Chrome binary. Searched on `PATH` when unset.
    pub chrome_path: Option<PathBuf>,
    /// Extra command-line arguments passed to every browser invocation.
    pub extra_args: Vec<String>,
    /// Time limit for a single render, in seconds.
    pub timeout_secs: u64,
    /// Attempts per message, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

/// Scheduling of message tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of message tasks in flight per archive in parallel mode.
    pub max_in_flight: usize,
}

/// Where to look for archives when `--input` is not given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Environment variable naming the application-data root.
    pub app_data_env: String,
    /// Profile directory relative to the application-data root.
    pub profile_subdir: PathBuf,
    /// File extensions (without dot) that are never treated as archives.
    pub skip_extensions: Vec<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            extra_args: Vec::new(),
            timeout_secs: 600,
            max_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_in_flight: 5 }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            app_data_env: "APPDATA".to_string(),
            profile_subdir: PathBuf::from("Thunderbird").join("Profiles"),
            skip_extensions: Vec::new(),
        }
    }
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXPDF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mboxpdf").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxpdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.render.max_attempts, 3);
        assert_eq!(cfg.render.timeout(), Duration::from_secs(600));
        assert_eq!(cfg.pipeline.max_in_flight, 5);
        assert_eq!(cfg.discovery.app_data_env, "APPDATA");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[render]
chrome_path = "/opt/chromium/chrome"
max_attempts = 5

[pipeline]
max_in_flight = 2
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(
            cfg.render.chrome_path.as_deref(),
            Some(std::path::Path::new("/opt/chromium/chrome"))
        );
        assert_eq!(cfg.render.max_attempts, 5);
        assert_eq!(cfg.pipeline.max_in_flight, 2);
        // Other fields use defaults
        assert_eq!(cfg.render.retry_backoff_ms, 500);
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.discovery.skip_extensions.is_empty());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.render.timeout_secs, cfg.render.timeout_secs);
        assert_eq!(parsed.discovery.profile_subdir, cfg.discovery.profile_subdir);
    }
}
