//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSIFT_CONFIG` (environment variable)
//! 2. `~/.config/mailsift/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailsift\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Indexing pipeline settings.
    pub index: IndexConfig,
    /// Search defaults.
    pub search: SearchConfig,
    /// SQLite tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override data directory for the index and logs.
    pub data_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Indexing pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Explicit index file; defaults to `<data_dir>/index.db`.
    pub index_path: Option<PathBuf>,
    /// File extensions treated as messages (case-insensitive, no dot).
    pub extensions: Vec<String>,
    /// Store the full body text so content searches can match it.
    pub include_body: bool,
    /// Number of staged documents per write transaction.
    pub batch_size: usize,
    /// Maximum characters kept in the body preview column.
    pub preview_length: usize,
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the query does not override it.
    pub default_take: usize,
    /// Maximum snippet length in characters.
    pub snippet_length: usize,
}

/// SQLite tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Page cache size in KiB (default: 65536 = 64 MB).
    pub cache_size_kib: i64,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            extensions: vec!["eml".to_string()],
            include_body: true,
            batch_size: 100,
            preview_length: 500,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_take: 100,
            snippet_length: 200,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cache_size_kib: 64 * 1024,
            busy_timeout_ms: 5_000,
        }
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
    if let Ok(env_path) = std::env::var("MAILSIFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailsift").join("config.toml"))
}

/// Return the data directory for the index and logs.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsift")
}

/// Return the index database path.
pub fn index_path(config: &Config) -> PathBuf {
    match config.index.index_path {
        Some(ref path) => path.clone(),
        None => data_dir(config).join("index.db"),
    }
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    data_dir(config).join("mailsift.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.index.batch_size, 100);
        assert_eq!(cfg.index.extensions, vec!["eml".to_string()]);
        assert!(cfg.index.include_body);
        assert_eq!(cfg.search.default_take, 100);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[index]
batch_size = 250
extensions = ["eml", "msg"]

[search]
snippet_length = 80
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.index.batch_size, 250);
        assert_eq!(cfg.index.extensions.len(), 2);
        assert_eq!(cfg.search.snippet_length, 80);
        // Other fields use defaults
        assert_eq!(cfg.search.default_take, 100);
        assert_eq!(cfg.performance.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_explicit_index_path_wins() {
        let mut cfg = Config::default();
        cfg.general.data_dir = Some(PathBuf::from("/tmp/sift-data"));
        assert_eq!(index_path(&cfg), PathBuf::from("/tmp/sift-data/index.db"));

        cfg.index.index_path = Some(PathBuf::from("/var/mail/index.sqlite"));
        assert_eq!(index_path(&cfg), PathBuf::from("/var/mail/index.sqlite"));
    }
}
