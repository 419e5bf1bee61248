// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Filesystem persistence: atomic writes and the backup baseline store.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::MapId;

mod atomic;
mod backup;

pub use atomic::{write_atomic, WriteDurability};
pub use backup::BackupStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no backup baseline for map {id}")]
    MissingBaseline { id: MapId },
    #[error("refusing to write through symlink at {path:?}")]
    SymlinkRefused { path: PathBuf },
}
