//! CLI configuration handling.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use gitsmith_core::ClientOptions;
use gitsmith_core::connector::DEFAULT_CONNECTOR_URL;
use gitsmith_core::github::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use gitsmith_core::resolver::DEFAULT_REFRESH_SKEW_SECS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `github_api_url`.
const GITHUB_API_URL_VAR: &str = "GITSMITH_GITHUB_API_URL";

/// Overrides `auth` (`connector` or `token`).
const AUTH_VAR: &str = "GITSMITH_AUTH";

/// Upper bound for `refresh_skew_secs`: one day.
const MAX_REFRESH_SKEW_SECS: i64 = 24 * 60 * 60;

/// Where credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Delegated tokens from the connector service.
    #[default]
    Connector,
    /// A personal access token in `GITHUB_TOKEN`.
    Token,
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connector" => Ok(Self::Connector),
            "token" => Ok(Self::Token),
            other => bail!("unknown auth mode `{}` (expected connector or token)", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// GitHub REST API base URL.
    pub github_api_url: String,

    /// Connector base URL, used when `GITSMITH_CONNECTOR_URL` is unset.
    pub connector_url: String,

    /// Timeout for every HTTP request, in seconds.
    pub timeout_secs: u64,

    /// Refresh tokens this many seconds before they expire.
    pub refresh_skew_secs: i64,

    /// Logging level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Credential source.
    pub auth: AuthMode,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            github_api_url: DEFAULT_API_URL.to_string(),
            connector_url: DEFAULT_CONNECTOR_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            log_level: "info".to_string(),
            auth: AuthMode::default(),
            config_path: None,
        }
    }
}

impl CliConfig {
    /// Parse a configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut config: CliConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = set(GITHUB_API_URL_VAR) {
            self.github_api_url = url;
        }
        if let Some(mode) = set(AUTH_VAR) {
            self.auth = mode
                .parse()
                .with_context(|| format!("Invalid value for {}", AUTH_VAR))?;
        }
        Ok(())
    }

    /// Reject values the clients cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if self.refresh_skew_secs < 0 {
            bail!("refresh_skew_secs must not be negative");
        }
        if self.refresh_skew_secs > MAX_REFRESH_SKEW_SECS {
            bail!(
                "refresh_skew_secs must be at most {} (one day)",
                MAX_REFRESH_SKEW_SECS
            );
        }
        Ok(())
    }

    /// HTTP settings for the dispatcher.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            github_api_url: self.github_api_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            refresh_skew: chrono::Duration::seconds(self.refresh_skew_secs),
        }
    }
}

/// Load configuration from `explicit`, or the default location, or defaults.
///
/// An explicitly named file must exist. Environment overrides are applied
/// last.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let mut config = match explicit {
        Some(path) => CliConfig::load_from(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => CliConfig::load_from(&path)?,
            _ => CliConfig::default(),
        },
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("gitsmith.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "gitsmith", "gitsmith")
}
