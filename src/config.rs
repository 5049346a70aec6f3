//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::UnknownFieldPolicy;
use crate::storage::{ColumnSpec, StoreConfig};
use crate::suggest::{SuggestOptions, DEFAULT_VALUE_LIMIT};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub suggest: SuggestConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Record store location and table layout
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Navigation relations, each backed by an `(id, name)` table
    #[serde(default)]
    pub relations: Vec<String>,

    /// Extra typed columns of the record table
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("metasift").join("catalog.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./metasift_data/catalog.db".to_string())
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            relations: Vec::new(),
            columns: Vec::new(),
        }
    }
}

impl DatabaseConfig {
    /// Database file with a leading `~/` expanded to the home directory
    pub fn resolved_path(&self) -> PathBuf {
        match (self.path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.path),
        }
    }
}

/// Field catalog discovery settings
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub unknown_fields: UnknownFieldPolicy,

    #[serde(default = "default_uuid_column")]
    pub uuid_column: Option<String>,

    #[serde(default = "default_flattened_metadata")]
    pub flattened_metadata: bool,

    #[serde(default = "default_text_columns")]
    pub searchable: Vec<String>,

    #[serde(default = "default_text_columns")]
    pub free_text: Vec<String>,
}

fn default_uuid_column() -> Option<String> {
    Some("uuid".to_string())
}

fn default_flattened_metadata() -> bool {
    true
}

fn default_text_columns() -> Vec<String> {
    vec!["name".to_string(), "description".to_string()]
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::default(),
            uuid_column: default_uuid_column(),
            flattened_metadata: default_flattened_metadata(),
            searchable: default_text_columns(),
            free_text: default_text_columns(),
        }
    }
}

/// Autocomplete settings
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_value_limit")]
    pub value_limit: usize,

    #[serde(default = "default_field_limit")]
    pub field_limit: usize,

    #[serde(default = "default_sampler_timeout")]
    pub sampler_timeout_ms: u64,
}

fn default_value_limit() -> usize {
    DEFAULT_VALUE_LIMIT
}

fn default_field_limit() -> usize {
    50
}

fn default_sampler_timeout() -> u64 {
    1500
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            value_limit: default_value_limit(),
            field_limit: default_field_limit(),
            sampler_timeout_ms: default_sampler_timeout(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Autocomplete sessions kept at once; the least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_sessions() -> usize {
    1024
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl ApiConfig {
    /// Socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("metasift").join("config.toml")),
            Some(PathBuf::from("/etc/metasift/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("METASIFT_DB_PATH") {
            self.database.path = path;
        }

        if let Ok(policy) = std::env::var("METASIFT_UNKNOWN_FIELDS") {
            match policy.as_str() {
                "reject" => self.catalog.unknown_fields = UnknownFieldPolicy::Reject,
                "metadata_probe" => self.catalog.unknown_fields = UnknownFieldPolicy::MetadataProbe,
                other => tracing::warn!("Ignoring METASIFT_UNKNOWN_FIELDS={}", other),
            }
        }

        if let Ok(timeout) = std::env::var("METASIFT_SAMPLER_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.suggest.sampler_timeout_ms = ms;
            }
        }

        if let Ok(host) = std::env::var("METASIFT_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("METASIFT_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Ok(level) = std::env::var("METASIFT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("METASIFT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Record store settings
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            relations: self.database.relations.clone(),
            columns: self.database.columns.clone(),
            searchable: self.catalog.searchable.clone(),
            free_text: self.catalog.free_text.clone(),
            uuid_column: self.catalog.uuid_column.clone(),
            unknown_fields: self.catalog.unknown_fields,
            flattened_metadata: self.catalog.flattened_metadata,
        }
    }

    /// Autocomplete settings
    pub fn suggest_options(&self) -> SuggestOptions {
        SuggestOptions {
            value_limit: self.suggest.value_limit,
            field_limit: self.suggest.field_limit,
            sampler_timeout: Duration::from_millis(self.suggest.sampler_timeout_ms),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# metasift configuration
#
# Environment variables override these settings:
# - METASIFT_DB_PATH
# - METASIFT_UNKNOWN_FIELDS
# - METASIFT_SAMPLER_TIMEOUT_MS
# - METASIFT_API_HOST
# - METASIFT_API_PORT
# - METASIFT_LOG_LEVEL
# - METASIFT_LOG_FORMAT

[database]
# SQLite database file
path = "~/.local/share/metasift/catalog.db"

# Navigation relations; "genre" creates a genre table and a genre_id column
relations = ["author", "genre", "publisher"]

# Extra typed columns: text, number, boolean or timestamp
columns = [
    { name = "price", kind = "number" },
    { name = "in_stock", kind = "boolean" },
]

[catalog]
# Unknown field names: "reject" or "metadata_probe" (treat as metadata keys)
unknown_fields = "reject"

# Column searched when a bare term is a UUID
uuid_column = "uuid"

# Search the flattened text of all metadata values in bare terms
flattened_metadata = true

# Columns searched by bare terms
searchable = ["name", "description"]

# Long text columns without value autocomplete
free_text = ["name", "description"]

[suggest]
# Values offered after an operator
value_limit = 20

# Field names offered per request
field_limit = 50

# Time budget for value sampling (ms)
sampler_timeout_ms = 1500

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8090

# Allowed CORS origins; empty allows any
cors_origins = []

# Request timeout in seconds
request_timeout_secs = 30

# Autocomplete sessions kept in memory
max_sessions = 1024

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/metasift/metasift.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ColumnKind;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 8090);
        assert_eq!(config.catalog.unknown_fields, UnknownFieldPolicy::Reject);
        assert_eq!(config.catalog.uuid_column.as_deref(), Some("uuid"));
        assert_eq!(config.suggest_options().sampler_timeout, Duration::from_millis(1500));
        assert_eq!(config.suggest_options().value_limit, 20);
        assert!(config.database.relations.is_empty());
    }

    #[test]
    fn test_resolved_path() {
        let mut db = DatabaseConfig::default();
        db.path = "/var/lib/metasift/catalog.db".to_string();
        assert_eq!(db.resolved_path(), PathBuf::from("/var/lib/metasift/catalog.db"));

        db.path = "~/catalog.db".to_string();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(db.resolved_path(), home.join("catalog.db"));
        }
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.database.relations, vec!["author", "genre", "publisher"]);
        assert_eq!(config.database.columns.len(), 2);
        assert_eq!(config.database.columns[1].kind, ColumnKind::Boolean);
        assert_eq!(config.logging.format, "pretty");

        let store = config.store_config();
        assert_eq!(store.relations.len(), 3);
        assert!(store.flattened_metadata);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[catalog]\nunknown_fields = \"metadata_probe\"\n\n[suggest]\nsampler_timeout_ms = 250"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.catalog.unknown_fields, UnknownFieldPolicy::MetadataProbe);
        assert_eq!(config.suggest.sampler_timeout_ms, 250);
        assert_eq!(config.suggest.value_limit, 20);
        assert_eq!(config.api.host, "0.0.0.0");
    }

    #[test]
    fn test_load_errors() {
        let err = Config::load(Path::new("/nonexistent/metasift.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = \"not a number\"").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
