/// Configuration for client-gallery

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GalleryError, Result};
use crate::state::edit::EditRequestLimits;

/// Default catalog location.
///
/// - Linux: ~/.local/share/client-gallery/gallery.db
/// - macOS: ~/Library/Application Support/client-gallery/gallery.db
/// - Windows: %APPDATA%\client-gallery\gallery.db
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("client-gallery")
        .join("gallery.db")
}

fn default_preview_base_url() -> String {
    "https://drive.google.com/thumbnail?id=".to_string()
}

fn default_actor() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite catalog file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Prefix for provider thumbnail URLs (external id is appended)
    #[serde(default = "default_preview_base_url")]
    pub preview_base_url: String,

    /// Root for locally stored uploads; enables the local preview resolver
    #[serde(default)]
    pub local_media_root: Option<PathBuf>,

    /// Actor recorded on selection changes made from the CLI
    #[serde(default = "default_actor")]
    pub default_actor: String,

    #[serde(default)]
    pub edit_request: EditRequestLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            preview_base_url: default_preview_base_url(),
            local_media_root: None,
            default_actor: default_actor(),
            edit_request: EditRequestLimits::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| GalleryError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| GalleryError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
