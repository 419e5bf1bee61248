// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Byte-exact copies of map files as they were when opened.
//!
//! The save path diffs against these copies, never against the live file, so an external
//! edit to a map after it was opened cannot leak into the keys a save picks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, warn};

use super::atomic::{write_atomic, WriteDurability};
use super::StoreError;
use crate::model::MapId;

const BACKUP_SUFFIX: &str = ".dmm.backup";

#[derive(Debug)]
enum BackupRoot {
    Scratch(TempDir),
    Dir(PathBuf),
}

impl BackupRoot {
    fn path(&self) -> &Path {
        match self {
            Self::Scratch(dir) => dir.path(),
            Self::Dir(path) => path,
        }
    }
}

/// Backup files keyed by map identity. Clones share the same directory; a scratch directory
/// is removed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: Arc<BackupRoot>,
    durability: WriteDurability,
}

impl BackupStore {
    /// A store in a fresh process-owned scratch directory.
    pub fn scratch() -> Result<Self, StoreError> {
        let dir = tempfile::Builder::new()
            .prefix("tilewright-backups-")
            .tempdir()
            .map_err(|source| StoreError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        Ok(Self {
            root: Arc::new(BackupRoot::Scratch(dir)),
            durability: WriteDurability::default(),
        })
    }

    /// A store in `dir`, created if missing. Existing backups there are left alone.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            root: Arc::new(BackupRoot::Dir(dir)),
            durability: WriteDurability::default(),
        })
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn baseline_path(&self, id: MapId) -> PathBuf {
        self.root().join(format!("{id}{BACKUP_SUFFIX}"))
    }

    /// Records `bytes` as the baseline for `id`, replacing any earlier one.
    pub fn snapshot(&self, id: MapId, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.baseline_path(id);
        write_atomic(&path, bytes, self.durability)?;
        debug!(map = %id, path = %path.display(), len = bytes.len(), "backup written");
        Ok(path)
    }

    pub fn read_baseline(&self, id: MapId) -> Result<Vec<u8>, StoreError> {
        let path = self.baseline_path(id);
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::MissingBaseline { id },
            _ => StoreError::Io { path, source },
        })
    }

    pub fn contains(&self, id: MapId) -> bool {
        self.baseline_path(id).is_file()
    }

    /// Removes the baseline for `id`. Missing files are not an error.
    pub fn discard(&self, id: MapId) -> Result<(), StoreError> {
        let path = self.baseline_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(map = %id, "backup discarded");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Removes every baseline. Failures are logged and the first one is returned after all
    /// files were attempted.
    pub fn discard_all(&self) -> Result<(), StoreError> {
        let mut first_err = None;
        for id in self.ids()? {
            if let Err(err) = self.discard(id) {
                warn!(map = %id, error = %err, "failed to discard backup");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Identities with a baseline on disk, in ascending order.
    pub fn ids(&self) -> Result<Vec<MapId>, StoreError> {
        let root = self.root();
        let entries = fs::read_dir(root).map_err(|source| StoreError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: root.to_path_buf(),
                source,
            })?;
            let name = entry.file_name();
            let Some(hex) = name.to_str().and_then(|name| name.strip_suffix(BACKUP_SUFFIX))
            else {
                continue;
            };
            if let Ok(raw) = u64::from_str_radix(hex, 16) {
                ids.push(MapId::from_raw(raw));
            }
        }
        ids.sort();
        Ok(ids)
    }
}
