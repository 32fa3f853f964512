//! Configuration file support
//!
//! Config is loaded from `~/.livingbooks/config.toml` (or
//! `$LIVINGBOOKS_HOME/config.toml`). Environment variables override config
//! file settings.

use crate::local_plan::DEFAULT_STORAGE_KEY;
use crate::storage::app_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global config instance (loaded once on first access)
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::load)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Backend API configuration
    pub api: ApiConfig,

    /// Guest plan storage
    pub local: LocalConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend origin (default: http://localhost:8000)
    pub base_url: String,
    /// Reading-plan collection path (default: /api/v1/plans)
    pub plans_path: String,
    /// Bulk import endpoint, relative to `plans_path` (default: import)
    pub import_path: String,
    /// Catalog book path (default: /api/v1/books)
    pub books_path: String,
    /// Session probe path (default: /api/v1/auth/me)
    pub session_path: String,
    /// Name given to plans created by importing a guest plan
    pub import_plan_name: String,
    /// Bearer token for the account session (prefer LIVINGBOOKS_SESSION_TOKEN).
    /// Read from the file but never written back by `save()`.
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            plans_path: "/api/v1/plans".to_string(),
            import_path: "import".to_string(),
            books_path: "/api/v1/books".to_string(),
            session_path: "/api/v1/auth/me".to_string(),
            import_plan_name: "My Reading Plan".to_string(),
            session_token: None,
        }
    }
}

/// Guest plan storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Key the guest plan is stored under
    pub storage_key: String,
    /// Directory for the file-backed store (default: ~/.livingbooks/local)
    pub storage_dir: Option<PathBuf>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> Option<PathBuf> {
        app_dir().ok().map(|d| d.join("config.toml"))
    }

    /// Load config from file, with environment variable overrides
    pub fn load() -> Self {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        config
    }

    fn load_from_file() -> Option<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        match Self::parse(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::error!("Failed to parse config file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LIVINGBOOKS_API_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = std::env::var("LIVINGBOOKS_PLANS_PATH") {
            self.api.plans_path = v;
        }
        if let Ok(v) = std::env::var("LIVINGBOOKS_SESSION_TOKEN") {
            let v = v.trim().to_string();
            self.api.session_token = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("LIVINGBOOKS_STORAGE_KEY") {
            if !v.trim().is_empty() {
                self.local.storage_key = v;
            }
        }
        if let Ok(v) = std::env::var("LIVINGBOOKS_STORAGE_DIR") {
            self.local.storage_dir = Some(PathBuf::from(v));
        }
    }

    /// Save config to file
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("No config path"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Human-readable summary for `livingbooks config`. The token is never
    /// printed.
    pub fn display_string(&self) -> String {
        let path = Self::path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(unavailable)".to_string());
        let storage_dir = self
            .local
            .storage_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(default)".to_string());
        let token = if self.api.session_token.is_some() {
            "set"
        } else {
            "not set"
        };

        format!(
            "**Config file:** {}\n\n\
             **API:**\n\
             - base_url: {}\n\
             - plans_path: {}\n\
             - import_path: {}\n\
             - books_path: {}\n\
             - session_path: {}\n\
             - import_plan_name: {}\n\
             - session_token: {}\n\n\
             **Local:**\n\
             - storage_key: {}\n\
             - storage_dir: {}\n",
            path,
            self.api.base_url,
            self.api.plans_path,
            self.api.import_path,
            self.api.books_path,
            self.api.session_path,
            self.api.import_plan_name,
            token,
            self.local.storage_key,
            storage_dir,
        )
    }
}
