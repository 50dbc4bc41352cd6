//! Application configuration for metaenrich.
//!
//! User config lives at `~/.metaenrich/metaenrich.toml`.
//! CLI flags override config file values, which override defaults.
//! Secret values are never stored in the file; it only names them, and
//! [`SecretSource`] resolves the names at stage start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EnrichError, Result};
use crate::secrets::SecretSource;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "metaenrich.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".metaenrich";

/// Default token cache file name inside the config directory.
const TOKEN_CACHE_FILE_NAME: &str = "token_cache.json";

/// Public client id used for the device-code login when none is configured.
const DEFAULT_INTERACTIVE_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Tenant used for interactive login when no tenant secret is available.
const DEFAULT_INTERACTIVE_TENANT: &str = "organizations";

/// Hard upper bound on sampled rows.
pub const MAX_SAMPLE_ROWS: usize = 200;

// ---------------------------------------------------------------------------
// Config structs (matching metaenrich.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Where secret values come from.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Catalog service settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Query engine settings.
    #[serde(default)]
    pub query_engine: QueryEngineConfig,

    /// Document capture settings.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Language model settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding every per-identifier artifact.
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
    "history".into()
}

/// Which backing store [`SecretSource`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretBackend {
    /// Environment variables, named by upper-casing the secret name.
    #[default]
    Env,
    /// One file per secret inside a mounted directory.
    Mounted,
}

/// `[secrets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub source: SecretBackend,

    /// Mount point used when `source = "mounted"`.
    #[serde(default = "default_secrets_dir")]
    pub dir: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            source: SecretBackend::default(),
            dir: default_secrets_dir(),
        }
    }
}

fn default_secrets_dir() -> String {
    "/run/secrets".into()
}

/// How the catalog stage obtains its bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStrategy {
    /// OAuth2 client-credentials grant.
    #[default]
    ClientSecret,
    /// Device-code login in the browser, backed by the token cache.
    Interactive,
    /// Reuse a cached token; never prompts.
    CachedToken,
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub auth: AuthStrategy,

    /// Secret holding the catalog account name.
    #[serde(default = "default_account_secret")]
    pub account_secret: String,

    #[serde(default = "default_tenant_secret")]
    pub tenant_secret: String,

    #[serde(default = "default_client_id_secret")]
    pub client_id_secret: String,

    #[serde(default = "default_client_secret_secret")]
    pub client_secret_secret: String,

    /// Public client id for interactive login.
    #[serde(default = "default_interactive_client_id")]
    pub interactive_client_id: String,

    /// OAuth scope requested for catalog calls.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Identity provider base URL.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Overrides `https://<account>.purview.azure.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_true")]
    pub include_lineage: bool,

    #[serde(default = "default_lineage_depth")]
    pub lineage_depth: u32,

    /// Token cache file (defaults to `~/.metaenrich/token_cache.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_cache: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            auth: AuthStrategy::default(),
            account_secret: default_account_secret(),
            tenant_secret: default_tenant_secret(),
            client_id_secret: default_client_id_secret(),
            client_secret_secret: default_client_secret_secret(),
            interactive_client_id: default_interactive_client_id(),
            scope: default_scope(),
            authority: default_authority(),
            endpoint: None,
            include_lineage: true,
            lineage_depth: default_lineage_depth(),
            token_cache: None,
        }
    }
}

fn default_account_secret() -> String {
    "purview-account-name".into()
}
fn default_tenant_secret() -> String {
    "azure-tenant-id".into()
}
fn default_client_id_secret() -> String {
    "azure-client-id".into()
}
fn default_client_secret_secret() -> String {
    "azure-client-secret".into()
}
fn default_interactive_client_id() -> String {
    DEFAULT_INTERACTIVE_CLIENT_ID.into()
}
fn default_scope() -> String {
    "https://purview.azure.net/.default".into()
}
fn default_authority() -> String {
    "https://login.microsoftonline.com".into()
}
fn default_true() -> bool {
    true
}
fn default_lineage_depth() -> u32 {
    3
}

/// `[query_engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEngineConfig {
    #[serde(default = "default_host_secret")]
    pub host_secret: String,

    #[serde(default = "default_port_secret")]
    pub port_secret: String,

    #[serde(default = "default_user_secret")]
    pub user_secret: String,

    #[serde(default = "default_password_secret")]
    pub password_secret: String,

    /// Port used when the port secret is absent.
    #[serde(default = "default_port")]
    pub default_port: u16,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Rows drawn per sample; clamped to [`MAX_SAMPLE_ROWS`].
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Delay between job status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            host_secret: default_host_secret(),
            port_secret: default_port_secret(),
            user_secret: default_user_secret(),
            password_secret: default_password_secret(),
            default_port: default_port(),
            scheme: default_scheme(),
            sample_limit: default_sample_limit(),
            connect_timeout_secs: default_connect_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_host_secret() -> String {
    "dremio-host".into()
}
fn default_port_secret() -> String {
    "dremio-port".into()
}
fn default_user_secret() -> String {
    "dremio-user".into()
}
fn default_password_secret() -> String {
    "dremio-password".into()
}
fn default_port() -> u16 {
    9047
}
fn default_scheme() -> String {
    "http".into()
}
fn default_sample_limit() -> usize {
    MAX_SAMPLE_ROWS
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    500
}

/// `[capture]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: default_navigation_timeout(),
            chrome_executable: None,
        }
    }
}

fn default_navigation_timeout() -> u64 {
    60
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Secret holding the API key (never store the key itself).
    #[serde(default = "default_api_key_secret")]
    pub api_key_secret: String,

    /// OpenAI-compatible API base.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Sample rows shown to the model.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_secret: default_api_key_secret(),
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_api_key_secret() -> String {
    "openai-api-key".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_preview_rows() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Runtime settings (resolved from config + secrets, one per stage)
// ---------------------------------------------------------------------------

/// Resolved credential strategy for the catalog stage.
#[derive(Debug, Clone)]
pub enum AuthSettings {
    ClientSecret {
        authority: String,
        tenant: String,
        client_id: String,
        client_secret: String,
        scope: String,
    },
    Interactive {
        authority: String,
        tenant: String,
        client_id: String,
        scope: String,
        cache_path: PathBuf,
    },
    CachedToken {
        tenant: String,
        scope: String,
        cache_path: PathBuf,
    },
}

/// Runtime catalog settings.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Base URL of the catalog data plane, without trailing slash.
    pub endpoint: String,
    pub auth: AuthSettings,
    pub include_lineage: bool,
    pub lineage_depth: u32,
}

impl CatalogSettings {
    /// Resolve catalog settings, reading only the secrets the chosen
    /// strategy needs.
    pub fn resolve(config: &AppConfig, secrets: &SecretSource) -> Result<Self> {
        let cat = &config.catalog;

        let endpoint = match &cat.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let account = secrets.require(&cat.account_secret)?;
                format!("https://{account}.purview.azure.com")
            }
        };

        let cache_path = || -> Result<PathBuf> {
            match &cat.token_cache {
                Some(p) => Ok(PathBuf::from(p)),
                None => Ok(config_dir()?.join(TOKEN_CACHE_FILE_NAME)),
            }
        };

        let auth = match cat.auth {
            AuthStrategy::ClientSecret => AuthSettings::ClientSecret {
                authority: cat.authority.clone(),
                tenant: secrets.require(&cat.tenant_secret)?,
                client_id: secrets.require(&cat.client_id_secret)?,
                client_secret: secrets.require(&cat.client_secret_secret)?,
                scope: cat.scope.clone(),
            },
            AuthStrategy::Interactive => AuthSettings::Interactive {
                authority: cat.authority.clone(),
                tenant: secrets
                    .optional(&cat.tenant_secret)?
                    .unwrap_or_else(|| DEFAULT_INTERACTIVE_TENANT.into()),
                client_id: cat.interactive_client_id.clone(),
                scope: cat.scope.clone(),
                cache_path: cache_path()?,
            },
            AuthStrategy::CachedToken => AuthSettings::CachedToken {
                tenant: secrets
                    .optional(&cat.tenant_secret)?
                    .unwrap_or_else(|| DEFAULT_INTERACTIVE_TENANT.into()),
                scope: cat.scope.clone(),
                cache_path: cache_path()?,
            },
        };

        Ok(Self {
            endpoint,
            auth,
            include_lineage: cat.include_lineage,
            lineage_depth: cat.lineage_depth,
        })
    }
}

/// Runtime query engine settings.
#[derive(Debug, Clone)]
pub struct QueryEngineSettings {
    /// `scheme://host:port`, no trailing slash.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub sample_limit: usize,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
}

impl QueryEngineSettings {
    pub fn resolve(config: &AppConfig, secrets: &SecretSource) -> Result<Self> {
        let qe = &config.query_engine;

        let host = secrets.require(&qe.host_secret)?;
        let port = match secrets.optional(&qe.port_secret)? {
            Some(p) => p.parse::<u16>().map_err(|e| {
                EnrichError::config(format!("secret '{}' is not a port: {e}", qe.port_secret))
            })?,
            None => qe.default_port,
        };

        Ok(Self {
            base_url: format!("{}://{host}:{port}", qe.scheme),
            username: secrets.require(&qe.user_secret)?,
            password: secrets.require(&qe.password_secret)?,
            sample_limit: qe.sample_limit.clamp(1, MAX_SAMPLE_ROWS),
            connect_timeout: Duration::from_secs(qe.connect_timeout_secs),
            poll_interval: Duration::from_millis(qe.poll_interval_ms),
        })
    }
}

/// Runtime capture settings.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub navigation_timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
}

impl From<&AppConfig> for CaptureSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            navigation_timeout: Duration::from_secs(config.capture.navigation_timeout_secs),
            chrome_executable: config.capture.chrome_executable.as_ref().map(PathBuf::from),
        }
    }
}

/// Runtime language model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub preview_rows: usize,
}

impl LlmSettings {
    pub fn resolve(config: &AppConfig, secrets: &SecretSource) -> Result<Self> {
        let llm = &config.llm;
        Ok(Self {
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            api_key: secrets.require(&llm.api_key_secret)?,
            model: llm.model.clone(),
            temperature: llm.temperature,
            preview_rows: llm.preview_rows,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.metaenrich/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| EnrichError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.metaenrich/metaenrich.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| EnrichError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| EnrichError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EnrichError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| EnrichError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EnrichError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
