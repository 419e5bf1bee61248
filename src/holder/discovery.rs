// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::Path;

use glob::{glob, Pattern};
use tracing::warn;

use super::events::DiscoverableMap;

/// Every `*.<extension>` file beneath `root`, sorted by relative path.
///
/// Unreadable entries are logged and skipped; an unusable root yields an empty index.
pub fn discover_maps(root: &Path, extension: &str) -> Vec<DiscoverableMap> {
    let pattern = format!(
        "{}/**/*.{}",
        Pattern::escape(&root.to_string_lossy()),
        Pattern::escape(extension)
    );
    let paths = match glob(&pattern) {
        Ok(paths) => paths,
        Err(err) => {
            warn!(root = %root.display(), error = %err, "map discovery pattern rejected");
            return Vec::new();
        }
    };

    let mut maps = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => {
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                maps.push(DiscoverableMap { path, relative });
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "skipping unreadable path during map discovery"),
        }
    }
    maps.sort_by(|a, b| a.relative.cmp(&b.relative));
    maps
}
