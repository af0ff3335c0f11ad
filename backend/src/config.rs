//! Configuration management.

use crate::auth::JwtSettings;
use crate::mcp::SessionSettings;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    backend: BackendConfig,
    #[serde(default)]
    auth: JwtSettings,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    mcp: McpConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
    /// Base URL clients reach the gateway at, used in endpoint announcements
    public_url: Option<String>,
    #[serde(default)]
    cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_url: None,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackendConfig {
    /// Base URL of the commerce REST API
    #[serde(default)]
    base_url: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionConfig {
    #[serde(default = "default_keepalive_secs")]
    keepalive_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    idle_timeout_secs: u64,
    #[serde(default = "default_buffer")]
    buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            buffer: default_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct McpConfig {
    /// Re-check roles on tools/call, not only on tools/list
    #[serde(default = "default_true")]
    enforce_call_roles: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enforce_call_roles: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

fn default_port() -> u16 {
    commerce_mcp_types::DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_keepalive_secs() -> u64 {
    15
}

fn default_idle_timeout_secs() -> u64 {
    60 * 60
}

fn default_buffer() -> usize {
    64
}

fn default_true() -> bool {
    true
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Externally visible base URL (scheme, host and port)
    pub public_url: Option<String>,
    /// Allowed CORS origins; empty allows any origin
    pub cors_allowed_origins: Vec<String>,
    /// Base URL of the commerce REST API
    pub backend_url: String,
    /// Timeout for a single backend request
    pub backend_timeout: Duration,
    /// Bearer token validation
    pub jwt: JwtSettings,
    /// Keepalive, idle ceiling and buffering of session streams
    pub session: SessionSettings,
    pub enforce_call_roles: bool,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are merged in this order, later files winning:
    /// 1. `config.toml` in user config directory (~/.config/commerce-mcp/ on Linux)
    /// 2. `.commerce-mcp.toml` in current directory
    /// 3. the file given with `--config`
    pub fn from_figment(
        config_path: Option<PathBuf>,
        port: Option<u16>,
        backend_url: Option<String>,
    ) -> anyhow::Result<Self> {
        // Find config file paths
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".commerce-mcp.toml"));
        let user_config = directories::ProjectDirs::from("", "", "commerce-mcp")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // Build figment with priority: defaults < user config < local config < explicit config < env vars < CLI args
        let mut figment = Figment::new();

        // 1. Start with defaults
        figment = figment.merge(Serialized::defaults(ConfigFile::default()));

        // 2. Merge user config file if it exists
        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // 3. Merge local config file if it exists
        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // 4. Merge the explicit config file, which must exist
        if let Some(ref path) = config_path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        // 5. Merge environment variables (COMMERCE_MCP_<SECTION>__<KEY>)
        figment = figment.merge(
            Env::prefixed("COMMERCE_MCP_").map(|key| key.as_str().replace("__", ".").into()),
        );

        // 6. Merge CLI arguments (highest priority)
        if let Some(p) = port {
            figment = figment.merge(Serialized::default("server.port", p));
        }
        if let Some(ref url) = backend_url {
            figment = figment.merge(Serialized::default("backend.base_url", url));
        }

        // Extract the configuration
        let config_file: ConfigFile = figment.extract()?;
        Self::from_file(config_file)
    }

    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        if file.auth.signing_key.trim().is_empty() {
            anyhow::bail!("auth.signing_key must be set");
        }
        if file.auth.issuer.trim().is_empty() {
            anyhow::bail!("auth.issuer must be set");
        }
        if file.auth.audience.trim().is_empty() {
            anyhow::bail!("auth.audience must be set");
        }
        if file.backend.base_url.trim().is_empty() {
            anyhow::bail!("backend.base_url must be set");
        }

        Ok(Self {
            port: file.server.port,
            public_url: file.server.public_url.filter(|url| !url.is_empty()),
            cors_allowed_origins: file.server.cors_allowed_origins,
            backend_url: file.backend.base_url,
            backend_timeout: Duration::from_secs(file.backend.timeout_secs),
            jwt: file.auth,
            session: SessionSettings {
                keepalive_interval: Duration::from_secs(file.session.keepalive_secs.max(1)),
                idle_timeout: Duration::from_secs(file.session.idle_timeout_secs),
                buffer: file.session.buffer.max(1),
            },
            enforce_call_roles: file.mcp.enforce_call_roles,
            log_file: file.logging.log_file,
            log_level: file.logging.log_level,
        })
    }
}
