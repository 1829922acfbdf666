//! Application configuration for tdocgraph.
//!
//! User config lives at `~/.tdocgraph/tdocgraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TdocGraphError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tdocgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tdocgraph";

// ---------------------------------------------------------------------------
// Config structs (matching tdocgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Graph store connection settings.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Ranking settings.
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Document retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer generation settings.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// `[graph]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Bolt URI of the graph store.
    #[serde(default = "default_graph_uri")]
    pub uri: String,

    /// Graph store user.
    #[serde(default = "default_graph_user")]
    pub user: String,

    /// Name of the env var holding the password (never store the password itself).
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_graph_uri(),
            user: default_graph_user(),
            password_env: default_password_env(),
        }
    }
}

fn default_graph_uri() -> String {
    "bolt://localhost:7687".into()
}
fn default_graph_user() -> String {
    "neo4j".into()
}
fn default_password_env() -> String {
    "TDOCGRAPH_GRAPH_PASSWORD".into()
}

/// `[ranking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Maximum number of ranked documents returned per query.
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            result_cap: default_result_cap(),
        }
    }
}

fn default_result_cap() -> usize {
    15
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Staging directory for downloaded corpus files.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Ceiling on concurrent downloads (the pool also never exceeds the
    /// number of ranked documents).
    #[serde(default = "default_fetch_concurrency")]
    pub concurrency: usize,

    /// Per-download request timeout in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            concurrency: default_fetch_concurrency(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    /// Per-download timeout as a [`Duration`].
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

fn default_staging_dir() -> String {
    "~/tdocgraph/uploads".into()
}
fn default_fetch_concurrency() -> usize {
    20
}
fn default_download_timeout_secs() -> u64 {
    20
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Generation endpoint (HTTP POST).
    #[serde(default = "default_generate_url")]
    pub generate_url: String,

    /// Readiness/statistics endpoint (HTTP GET, 200 = ready).
    #[serde(default = "default_stats_url")]
    pub stats_url: String,

    /// Token budget passed to the generation backend.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Number of supporting documents the backend should retrieve.
    #[serde(default = "default_num_docs")]
    pub num_docs: u32,

    /// Seconds between readiness probes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Wall-clock ceiling on the readiness wait, in seconds.
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,

    /// Per-probe request timeout in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Generation request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            generate_url: default_generate_url(),
            stats_url: default_stats_url(),
            max_tokens: default_max_tokens(),
            num_docs: default_num_docs(),
            poll_interval_secs: default_poll_interval_secs(),
            readiness_timeout_secs: default_readiness_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    /// Interval between readiness probes as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Readiness wait ceiling as a [`Duration`].
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    /// Per-probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Generation request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_generate_url() -> String {
    "http://localhost:4005/generate".into()
}
fn default_stats_url() -> String {
    "http://localhost:4004/v1/statistics".into()
}
fn default_max_tokens() -> u32 {
    5000
}
fn default_num_docs() -> u32 {
    10
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_readiness_timeout_secs() -> u64 {
    300
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_request_timeout_secs() -> u64 {
    90
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tdocgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TdocGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tdocgraph/tdocgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TdocGraphError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TdocGraphError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TdocGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TdocGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TdocGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the graph store password from the configured env var.
pub fn resolve_graph_password(config: &GraphConfig) -> Result<String> {
    let var_name = &config.password_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(TdocGraphError::config(format!(
            "graph store password not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Resolve the staging directory, expanding a leading `~` to the user's home.
pub fn resolve_staging_dir(config: &RetrievalConfig) -> Result<PathBuf> {
    let raw = &config.staging_dir;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| TdocGraphError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("bolt://localhost:7687"));
        assert!(toml_str.contains("TDOCGRAPH_GRAPH_PASSWORD"));
        assert!(toml_str.contains("result_cap"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.ranking.result_cap, 15);
        assert_eq!(parsed.retrieval.concurrency, 20);
        assert_eq!(parsed.generation.poll_interval_secs, 5);
        assert_eq!(parsed.generation.readiness_timeout_secs, 300);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[graph]
uri = "bolt://graph.internal:7687"

[ranking]
result_cap = 25
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.graph.uri, "bolt://graph.internal:7687");
        assert_eq!(config.graph.user, "neo4j");
        assert_eq!(config.ranking.result_cap, 25);
        assert_eq!(config.generation.max_tokens, 5000);
    }

    #[test]
    fn password_resolution() {
        let mut config = GraphConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.password_env = "TDG_TEST_NONEXISTENT_PASSWORD_12345".into();
        let result = resolve_graph_password(&config);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("password not found")
        );
    }

    #[test]
    fn staging_dir_tilde_expansion() {
        let config = RetrievalConfig {
            staging_dir: "/var/lib/tdocgraph/uploads".into(),
            ..RetrievalConfig::default()
        };
        let resolved = resolve_staging_dir(&config).expect("resolve");
        assert_eq!(resolved, PathBuf::from("/var/lib/tdocgraph/uploads"));

        let config = RetrievalConfig::default();
        let resolved = resolve_staging_dir(&config).expect("resolve");
        assert!(!resolved.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn duration_helpers() {
        let generation = GenerationConfig::default();
        assert_eq!(generation.poll_interval(), Duration::from_secs(5));
        assert_eq!(generation.readiness_timeout(), Duration::from_secs(300));
        assert_eq!(
            RetrievalConfig::default().download_timeout(),
            Duration::from_secs(20)
        );
    }
}
