//! Persistent node settings.
//!
//! A flat map of slash-separated paths to string values, stored as a JSON
//! object. The node keeps its identity and nickname here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Path of the node identity (hex).
pub const IDENTITY_PATH: &str = "/hydra/identity";

/// Path of the node nickname.
pub const NICKNAME_PATH: &str = "/hydra/nickname";

/// Nickname given to a freshly generated identity.
pub const DEFAULT_NICKNAME: &str = "Anonymous";

/// Path-keyed settings, optionally backed by a file.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    file: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields empty settings that will be written there on
    /// [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let values = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(Self {
            file: Some(path.to_path_buf()),
            values,
        })
    }

    /// Settings that are never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Get the value at a path.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.values.get(path).map(String::as_str)
    }

    /// Get the value at a path, or the default when unset.
    pub fn resolve(&self, path: &str, default: &str) -> String {
        self.get(path).unwrap_or(default).to_string()
    }

    /// Set the value at a path.
    pub fn put(&mut self, path: impl Into<String>, value: impl Into<String>) {
        self.values.insert(path.into(), value.into());
    }

    /// Write settings back to their file. No-op for in-memory settings.
    pub fn save(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(&self.values)?;
        std::fs::write(file, json)?;
        Ok(())
    }

    /// File the settings are saved to, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}
