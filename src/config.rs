//! TOML configuration for locating and opening message areas.
//!
//! ```toml
//! msgs_dir = "/bbs/msgs"
//! extension = "dat"
//!
//! [store]
//! max_sections = 1024
//! append_overflow = "drop"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{AppendOverflow, MessageStore, StoreOptions};
use crate::types::{StoreError, GAT_ENTRIES};

/// Errors raised while loading a [`StoreConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read store config {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse store config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value parsed but is out of range.
    #[error("invalid store config: {0}")]
    Invalid(String),
}

/// Where message files live and how stores over them are opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one message file per area.
    pub msgs_dir: PathBuf,
    /// File extension of message files, without the dot.
    pub extension: String,
    /// Options applied to every opened store.
    pub store: StoreSection,
}

/// The `[store]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// See [`StoreOptions::max_sections`].
    pub max_sections: u32,
    /// See [`StoreOptions::initial_data_blocks`].
    pub initial_data_blocks: u32,
    /// See [`StoreOptions::advisory_lock`].
    pub advisory_lock: bool,
    /// See [`StoreOptions::append_overflow`].
    pub append_overflow: AppendOverflow,
    /// See [`StoreOptions::sync_writes`].
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            msgs_dir: PathBuf::from("msgs"),
            extension: "dat".to_string(),
            store: StoreSection::default(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        let opts = StoreOptions::default();
        Self {
            max_sections: opts.max_sections,
            initial_data_blocks: opts.initial_data_blocks,
            advisory_lock: opts.advisory_lock,
            append_overflow: opts.append_overflow,
            sync_writes: opts.sync_writes,
        }
    }
}

impl StoreConfig {
    /// Reads and validates the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates config text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.extension.is_empty() || self.extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "extension '{}' must be a bare suffix",
                self.extension
            )));
        }
        if self.store.max_sections == 0 || self.store.max_sections > u32::MAX / GAT_ENTRIES as u32 {
            return Err(ConfigError::Invalid(format!(
                "max_sections {} out of range",
                self.store.max_sections
            )));
        }
        if self.store.initial_data_blocks as usize > GAT_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "initial_data_blocks {} exceeds one section",
                self.store.initial_data_blocks
            )));
        }
        Ok(())
    }

    /// Path of the message file for `area`, e.g. `msgs/general.dat`.
    pub fn area_path(&self, area: &str) -> PathBuf {
        self.msgs_dir.join(format!("{area}.{}", self.extension))
    }

    /// Store options described by the `[store]` table.
    pub fn options(&self) -> StoreOptions {
        StoreOptions::default()
            .max_sections(self.store.max_sections)
            .initial_data_blocks(self.store.initial_data_blocks)
            .advisory_lock(self.store.advisory_lock)
            .append_overflow(self.store.append_overflow)
            .sync_writes(self.store.sync_writes)
    }

    /// Opens the store for `area`; the file is created on first save.
    pub fn open_area(&self, area: &str) -> Result<MessageStore, StoreError> {
        if area.is_empty() || area.contains(['/', '\\']) {
            return Err(StoreError::Invalid("area name must be a bare file stem"));
        }
        MessageStore::open(self.area_path(area), self.options())
    }
}
