use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::domain::table::ColumnDef;
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_AI_TIMEOUT_SECS, DEFAULT_HOST,
    DEFAULT_MAX_RECENT_QUERIES, DEFAULT_PORT, DEFAULT_REWRITE_EXCLUDED_PREFIXES,
    DEFAULT_REWRITE_PARAM, DEFAULT_REWRITE_STATIC_EXTENSIONS,
};

/// Table ids appear in URL paths and storage keys
static TABLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid table id pattern"));

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Query correction service section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AiFileConfig {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Query editor section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueriesFileConfig {
    pub max_recent: Option<usize>,
}

/// Path rewrite section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RewriteFileConfig {
    pub param: Option<String>,
    pub excluded_prefixes: Option<Vec<String>>,
    pub static_extensions: Option<Vec<String>>,
}

/// One mounted table
#[derive(Debug, Clone, Deserialize)]
pub struct TableFileConfig {
    pub id: String,
    pub columns: Vec<ColumnDef>,
    /// JSON array of row objects
    #[serde(default)]
    pub rows: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub ai: Option<AiFileConfig>,
    pub queries: Option<QueriesFileConfig>,
    pub rewrite: Option<RewriteFileConfig>,
    pub tables: Option<Vec<TableFileConfig>>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    ///
    /// Lists (`tables`, rewrite prefixes and extensions) are replaced, not
    /// concatenated.
    fn merge(&mut self, other: FileConfig) {
        // Server
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        // AI
        if let Some(ai) = other.ai {
            let current = self.ai.get_or_insert_with(AiFileConfig::default);
            if ai.enabled.is_some() {
                tracing::trace!(enabled = ?ai.enabled, "Merging ai.enabled");
                current.enabled = ai.enabled;
            }
            if ai.url.is_some() {
                tracing::trace!(url = ?ai.url, "Merging ai.url");
                current.url = ai.url;
            }
            if ai.timeout_secs.is_some() {
                tracing::trace!(timeout_secs = ?ai.timeout_secs, "Merging ai.timeout_secs");
                current.timeout_secs = ai.timeout_secs;
            }
        }

        // Queries
        if let Some(queries) = other.queries {
            let current = self.queries.get_or_insert_with(QueriesFileConfig::default);
            if queries.max_recent.is_some() {
                tracing::trace!(max_recent = ?queries.max_recent, "Merging queries.max_recent");
                current.max_recent = queries.max_recent;
            }
        }

        // Rewrite
        if let Some(rewrite) = other.rewrite {
            let current = self.rewrite.get_or_insert_with(RewriteFileConfig::default);
            if rewrite.param.is_some() {
                tracing::trace!(param = ?rewrite.param, "Merging rewrite.param");
                current.param = rewrite.param;
            }
            if rewrite.excluded_prefixes.is_some() {
                tracing::trace!("Merging rewrite.excluded_prefixes");
                current.excluded_prefixes = rewrite.excluded_prefixes;
            }
            if rewrite.static_extensions.is_some() {
                tracing::trace!("Merging rewrite.static_extensions");
                current.static_extensions = rewrite.static_extensions;
            }
        }

        // Tables
        if other.tables.is_some() {
            tracing::trace!("Merging tables");
            self.tables = other.tables;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Query correction service configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub timeout_secs: u64,
}

/// Query editor configuration
#[derive(Debug, Clone)]
pub struct QueriesConfig {
    pub max_recent: usize,
}

/// Path-to-identifier rewrite rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    /// Query parameter that receives the identifier
    pub param: String,
    pub excluded_prefixes: Vec<String>,
    /// Lowercase, with leading dot
    pub static_extensions: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            param: DEFAULT_REWRITE_PARAM.to_string(),
            excluded_prefixes: DEFAULT_REWRITE_EXCLUDED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            static_extensions: DEFAULT_REWRITE_STATIC_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Mounted table configuration
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub id: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Option<PathBuf>,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ai: AiConfig,
    pub queries: QueriesConfig,
    pub rewrite: RewriteConfig,
    pub tables: Vec<TableConfig>,
    /// Keep table state in memory only
    pub ephemeral: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.ivy/ivy.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.ivy/ivy.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::from_layers(file_config, cli)
    }

    /// Layer defaults, merged file config and CLI/env overrides
    fn from_layers(file_config: FileConfig, cli: &CliConfig) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_ai = file_config.ai.unwrap_or_default();
        let file_queries = file_config.queries.unwrap_or_default();
        let file_rewrite = file_config.rewrite.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let ai = AiConfig {
            enabled: cli.ai_enabled.or(file_ai.enabled).unwrap_or(false),
            url: cli
                .ai_url
                .clone()
                .or(file_ai.url)
                .filter(|u| !u.trim().is_empty()),
            timeout_secs: cli
                .ai_timeout_secs
                .or(file_ai.timeout_secs)
                .unwrap_or(DEFAULT_AI_TIMEOUT_SECS),
        };

        let queries = QueriesConfig {
            max_recent: cli
                .max_recent_queries
                .or(file_queries.max_recent)
                .unwrap_or(DEFAULT_MAX_RECENT_QUERIES),
        };

        let defaults = RewriteConfig::default();
        let rewrite = RewriteConfig {
            param: file_rewrite.param.unwrap_or(defaults.param),
            excluded_prefixes: file_rewrite
                .excluded_prefixes
                .unwrap_or(defaults.excluded_prefixes),
            static_extensions: file_rewrite
                .static_extensions
                .map(|exts| exts.iter().map(|e| normalize_extension(e)).collect())
                .unwrap_or(defaults.static_extensions),
        };

        let tables = file_config
            .tables
            .unwrap_or_default()
            .into_iter()
            .map(|t| TableConfig {
                id: t.id,
                columns: t.columns,
                rows: t.rows.as_deref().map(expand_path),
            })
            .collect();

        let config = Self {
            server: ServerConfig { host, port },
            ai,
            queries,
            rewrite,
            tables,
            ephemeral: cli.ephemeral,
        };

        config.validate()?;
        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            ai_enabled = config.ai.enabled,
            tables = config.tables.len(),
            ephemeral = config.ephemeral,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Look up a configured table
    pub fn table(&self, id: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.id == id)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.ai.enabled {
            let Some(ref url) = self.ai.url else {
                anyhow::bail!("Configuration error: ai.url is required when ai.enabled is true");
            };
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!(
                    "Configuration error: ai.url must start with http:// or https://. Got: {}",
                    url
                );
            }
            if self.ai.timeout_secs == 0 {
                anyhow::bail!("Configuration error: ai.timeout_secs must be greater than 0");
            }
        }

        if self.queries.max_recent == 0 {
            anyhow::bail!("Configuration error: queries.max_recent must be greater than 0");
        }

        if self.rewrite.param.trim().is_empty() {
            anyhow::bail!("Configuration error: rewrite.param must not be empty");
        }

        let mut seen = HashSet::new();
        for table in &self.tables {
            if !TABLE_ID.is_match(&table.id) {
                anyhow::bail!(
                    "Configuration error: table id '{}' must be 1-64 letters, digits, '_' or '-'",
                    table.id
                );
            }
            if !seen.insert(table.id.as_str()) {
                anyhow::bail!("Configuration error: duplicate table id '{}'", table.id);
            }
            if table.columns.is_empty() {
                anyhow::bail!(
                    "Configuration error: table '{}' must declare at least one column",
                    table.id
                );
            }
        }

        if self.tables.is_empty() {
            tracing::warn!("No tables configured, the API will serve an empty table list");
        }

        Ok(())
    }
}

/// `PNG` and `.png` both become `.png`
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Get the profile config path (~/.ivy/ivy.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
