//! Application configuration for pestres.
//!
//! User config lives at `~/.pestres/pestres.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PestresError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pestres.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pestres";

/// Published location of the commodity taxonomy.
const CATEGORIES_URL: &str =
    "https://www.fao.org/fileadmin/templates/codexalimentarius/pestres/codex-commodities-en.json";

/// Commodity MRL detail endpoint.
const COMMODITY_DETAIL_URL: &str =
    "https://www.fao.org/jsoncodexpest/jsonrequest/commodities/details.html";

/// Pesticide MRL detail endpoint.
const PESTICIDE_DETAIL_URL: &str =
    "https://www.fao.org/jsoncodexpest/jsonrequest/pesticides/details.html";

// ---------------------------------------------------------------------------
// Config structs (matching pestres.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Fetch/retry tuning.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Remote endpoint overrides (defaults to the FAO service).
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output directory for the three CSV datasets.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum attempts per detail fetch (decode failures only).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in ms; doubles after each failed attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    5
}
fn default_backoff_base_ms() -> u64 {
    500
}

/// `[endpoints]` section — the remote service URLs.
///
/// Fixed at the domain level; overridable here so tests can point the
/// fetcher at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    /// Category taxonomy JSON document.
    #[serde(default = "default_categories_url")]
    pub categories_url: String,

    /// Commodity detail endpoint (takes `id` and `lang`).
    #[serde(default = "default_commodity_detail_url")]
    pub commodity_detail_url: String,

    /// Pesticide detail endpoint (takes `id` and `lang`).
    #[serde(default = "default_pesticide_detail_url")]
    pub pesticide_detail_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            categories_url: default_categories_url(),
            commodity_detail_url: default_commodity_detail_url(),
            pesticide_detail_url: default_pesticide_detail_url(),
        }
    }
}

fn default_categories_url() -> String {
    CATEGORIES_URL.into()
}
fn default_commodity_detail_url() -> String {
    COMMODITY_DETAIL_URL.into()
}
fn default_pesticide_detail_url() -> String {
    PESTICIDE_DETAIL_URL.into()
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration consumed by the API client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Remote endpoints.
    pub endpoints: Endpoints,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum attempts per detail fetch.
    pub max_attempts: u32,
    /// Base backoff delay in ms.
    pub backoff_base_ms: u64,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            endpoints: config.endpoints.clone(),
            timeout_secs: config.fetch.timeout_secs,
            max_attempts: config.fetch.max_attempts,
            backoff_base_ms: config.fetch.backoff_base_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pestres/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PestresError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pestres/pestres.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| PestresError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PestresError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PestresError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PestresError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PestresError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("fao.org"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.max_attempts, 5);
        assert_eq!(parsed.fetch.timeout_secs, 30);
        assert_eq!(parsed.defaults.output_dir, "./output");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
output_dir = "/tmp/mrl-out"

[fetch]
max_attempts = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.output_dir, "/tmp/mrl-out");
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.backoff_base_ms, 500);
        assert!(config.endpoints.categories_url.contains("codex-commodities-en.json"));
    }

    #[test]
    fn fetch_config_from_app_config() {
        let app = AppConfig::default();
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.max_attempts, 5);
        assert_eq!(fetch.backoff_base_ms, 500);
        assert!(fetch.endpoints.pesticide_detail_url.contains("pesticides"));
    }
}
