//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "EGLISE_ROOT_FOLDER";

/// Contents of `config.toml`; every field is optional in the file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HierarchyConfig {
    pub root_folder: Option<PathBuf>,
    pub database_file: String,
    pub log_level: String,
    pub max_connections: u32,
    /// Rebuild the owning church's impact chain after church, network and
    /// group mutations
    pub rebuild_after_mutation: bool,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_file: "eglise.db".to_string(),
            log_level: "info".to_string(),
            max_connections: crate::db::DEFAULT_MAX_CONNECTIONS,
            rebuild_after_mutation: true,
        }
    }
}

impl HierarchyConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load a config file, falling back to defaults when it is missing or
    /// unparsable
    pub fn load_or_default(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Config file {} not readable ({}), using defaults", path.display(), e);
                return Self::default();
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("{} in {}, using defaults", e, path.display());
                Self::default()
            }
        }
    }

    /// Load the platform config file if one exists
    pub fn load() -> Self {
        match config_file_path() {
            Ok(path) => Self::load_or_default(&path),
            Err(_) => Self::default(),
        }
    }

    /// Database file inside the resolved root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        root_folder.join(&self.database_file)
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &HierarchyConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = &config.root_folder {
        return root_folder.clone();
    }

    default_root_folder()
}

/// Get default configuration file path for the platform
pub fn config_file_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/eglise/config.toml first, then /etc/eglise/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("eglise").join("config.toml"));
        let system_config = PathBuf::from("/etc/eglise/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("eglise").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("eglise"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/eglise"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("eglise"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/eglise"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("eglise"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\eglise"))
    } else {
        PathBuf::from("./eglise_data")
    }
}
