// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::PathBuf;
use std::sync::Arc;

use crate::model::{MapDocument, MapId, MapSize};

/// A summary of an open map, cheap to clone into events and replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    pub id: MapId,
    pub path: PathBuf,
    pub size: MapSize,
    pub rev: u64,
    pub dirty: bool,
}

impl MapInfo {
    pub fn of(doc: &MapDocument) -> Self {
        Self {
            id: doc.id(),
            path: doc.source_path().to_path_buf(),
            size: doc.size(),
            rev: doc.rev(),
            dirty: doc.is_dirty(),
        }
    }
}

/// A map file found under the catalog root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiscoverableMap {
    pub path: PathBuf,
    /// `path` relative to the catalog root, for display.
    pub relative: PathBuf,
}

/// Lifecycle notifications, delivered in the order the holder emits them.
#[derive(Debug, Clone)]
pub enum HolderEvent {
    /// The active map changed; `None` once no map is active.
    ActiveChanged(Option<MapInfo>),
    /// A map left the open set. Collaborators should drop anything that refers to it.
    Closed(Arc<MapDocument>),
    /// The open set changed; maps in open order.
    OpenedMaps(Vec<MapInfo>),
    DiscoverableMaps(Arc<[DiscoverableMap]>),
}
