// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Editor configuration from `tilewright.toml`.
//!
//! Every section is optional; a missing file yields [`EditorConfig::default`].
//!
//! ```toml
//! [maps]
//! extension = "dmm"
//!
//! [backup]
//! dir = ".tilewright/backups"   # default: a scratch directory removed on exit
//!
//! [save]
//! format = "preserve"           # or "standard", "tgm"
//! durable_writes = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::dmm::SaveFormat;
use crate::store::WriteDurability;

pub const CONFIG_FILE_NAME: &str = "tilewright.toml";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub maps: MapsConfig,
    pub backup: BackupConfig,
    pub save: SaveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapsConfig {
    /// File extension of map files, without the dot.
    pub extension: String,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            extension: "dmm".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    /// Where baselines are kept. Relative paths resolve against the config file's directory.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaveConfig {
    pub format: SaveFormat,
    pub durable_writes: bool,
}

impl SaveConfig {
    pub fn durability(&self) -> WriteDurability {
        if self.durable_writes {
            WriteDurability::Durable
        } else {
            WriteDurability::BestEffort
        }
    }
}

impl EditorConfig {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        if let (Some(dir), Some(base)) = (config.backup.dir.as_mut(), path.parent()) {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = self.maps.extension.as_str();
        if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\', '*']) {
            return Err(ConfigError::Invalid(format!(
                "maps.extension must be a bare extension like \"dmm\", got {ext:?}"
            )));
        }
        Ok(())
    }
}

/// Walks up from `start` looking for `tilewright.toml`.
pub fn find_config_from(start: impl Into<PathBuf>) -> Option<PathBuf> {
    let mut current = start.into();
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_config_file(path: &Path) -> Result<EditorConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    EditorConfig::from_toml(&text, path)
}

/// Loads the nearest config above `start`, or the defaults when there is none.
pub fn load_config(start: &Path) -> Result<EditorConfig, ConfigError> {
    match find_config_from(start) {
        Some(path) => load_config_file(&path),
        None => Ok(EditorConfig::default()),
    }
}
