use std::path::{Path, PathBuf};

use artisync_types::ServerConfig;
use serde::Deserialize;

const fn default_true() -> bool {
    true
}

fn default_ignored_dirs() -> Vec<String> {
    vec!["persist".to_string()]
}

fn default_manifest_file() -> String {
    "Ballerina.toml".to_string()
}

const fn default_event_capacity() -> usize {
    64
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Tuning of the structure builder, the reconciler and the session.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Sort buckets when a tree is first built, not only after updates.
    #[serde(default = "default_true")]
    pub sort_on_build: bool,
    /// Directory names whose notifications never touch the tree.
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,
    /// Ignore notifications for files under the system temp directory.
    #[serde(default = "default_true")]
    pub skip_temp_dir: bool,
    /// Package manifest that local-connector placeholders point at.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    /// Buffered `ArtifactsUpdated` events per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    pub server: Option<ServerConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sort_on_build: true,
            ignored_dirs: default_ignored_dirs(),
            skip_temp_dir: true,
            manifest_file: default_manifest_file(),
            event_capacity: default_event_capacity(),
            server: None,
        }
    }
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        toml::from_str(&content).map_err(|err| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    /// The config at the default location, or `None` when there is none.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".artisync").join("config.toml"))
}
