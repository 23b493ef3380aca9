use super::EngineSettings;
use log::{debug, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// File name of the settings artifact inside the engine's installation directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to write settings file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {} is malformed: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialises [`EngineSettings`] to the fixed settings path the engine reads.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so a successful return never leaves a
/// partially written file behind. The engine may still observe the old
/// contents until the rename lands; concurrent writers are last-writer-wins.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store for the engine installed in `engine_dir`
    pub fn new<P: AsRef<Path>>(engine_dir: P) -> Self {
        Self {
            path: engine_dir.as_ref().join(SETTINGS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the settings file with `settings`
    pub fn write(&self, settings: &EngineSettings) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec(settings).map_err(|source| ConfigError::Format {
            path: self.path.clone(),
            source,
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Wrote {} bytes of settings to {}", json.len(), self.path.display());
        Ok(())
    }

    /// Read the settings file back
    pub fn read(&self) -> Result<EngineSettings, ConfigError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Format {
            path: self.path.clone(),
            source,
        })
    }

    /// Read persisted settings, falling back to defaults when the file is
    /// absent or unreadable.
    pub fn load_or_default(&self) -> EngineSettings {
        if !self.path.exists() {
            debug!("No settings file at {}, using defaults", self.path.display());
            return EngineSettings::default();
        }
        match self.read() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{}; using defaults", e);
                EngineSettings::default()
            }
        }
    }
}
