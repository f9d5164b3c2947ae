//! src/config.rs
//! ============================================================================
//! # Config: portal settings loaded from TOML
//!
//! Settings live at the platform config dir found through
//! [`directories`](https://docs.rs/directories). A missing file is created with
//! defaults on first load. Durations use `humantime` notation (`"300ms"`).
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! let engine = LocalEngine::new(config.search.fields.iter().map(String::as_str));
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::logging::LoggerConfig;
use crate::routing::{DASHBOARD_ROUTE, FORBIDDEN_ROUTE, LOGIN_ROUTE};
use crate::session::PROFILE_KEY;

const APP_NAME: &str = "AdminPortal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_take: usize,
    pub page_size_options: Vec<usize>,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_take: crate::filter::DEFAULT_TAKE,
            page_size_options: vec![10, 20, 50, 100],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Fields matched by the free-text search of local collections.
    pub fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fields: vec!["name".to_string(), "code".to_string()],
        }
    }
}

/// Token refresh retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,

    /// Fixed wait between attempts
    #[serde(with = "humantime_serde")]
    pub delay: Duration,

    /// How long before token expiry the refresh fires
    #[serde(with = "humantime_serde")]
    pub margin: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(300),
            margin: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage_key: String,

    /// Overrides the platform data dir for session files.
    pub dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: PROFILE_KEY.to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Where an expired session lands
    pub login: String,
    pub forbidden: String,

    /// Target after a successful login
    pub dashboard: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login: LOGIN_ROUTE.to_string(),
            forbidden: FORBIDDEN_ROUTE.to_string(),
            dashboard: DASHBOARD_ROUTE.to_string(),
        }
    }
}

/// Main configuration struct for the portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paging: PagingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub routes: RouteConfig,

    #[serde(default)]
    pub logging: LoggerConfig,
}

impl Config {
    /// Loads config from the platform config dir, creating it with defaults
    /// when absent.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            info!(
                marker = "CONFIG_DEFAULTED",
                operation_type = "config",
                path = %path.display(),
                "No config file found, writing defaults"
            );
            let default_config = Self::default();
            default_config.save_to(&path).await?;
            Ok(default_config)
        }
    }

    pub async fn load_from(path: &Path) -> anyhow::Result<Self> {
        info!(
            marker = "CONFIG_LOADING",
            operation_type = "config",
            path = %path.display(),
            "Loading config"
        );
        let text = TokioFs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let cfg: Self = toml::from_str(&text).context("Invalid config TOML")?;
        Ok(cfg)
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?).await
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(path, toml_str).await?;
        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "example", APP_NAME)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}
