// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! BYOND `.dmm` maps, standard and TGM flavors.
//!
//! Loading goes through [`DmmData`], the structural model of a file (dictionary in file
//! order, each entry's original text, and a dense key grid). Saving re-parses the backup
//! baseline into the same model so untouched dictionary entries can be written back
//! byte-for-byte.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::warn;

use crate::catalog::Catalog;
use crate::model::{MapDocument, MapSize, Overrides, Point, SourceFormat, Tile, TypePath};

mod keys;
mod parse;
mod write;

pub use keys::{key_at, key_index, KeyAllocator, KEY_ALPHABET, MAX_KEY_LEN};
pub use parse::{parse_dmm, DmmParseError, DmmParseErrorKind, TGM_HEADER};
pub use write::{save_map, DmmWriteError};

/// One `/type{vars}` element of a prefab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefabEntry {
    pub type_path: TypePath,
    pub vars: Option<Overrides>,
}

/// A tile's contents as written in the dictionary, bottom to top.
pub type Prefab = Vec<PrefabEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub key: SmolStr,
    pub prefab: Prefab,
    /// The entry exactly as it appeared in the file, from the key's opening quote through
    /// the closing parenthesis, plus a `//` comment trailing it on the same line.
    pub source: String,
    /// Whole-line comments directly above the entry, without line endings.
    pub comments: Vec<String>,
}

/// The structural model of a map file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmmData {
    pub format: SourceFormat,
    pub size: MapSize,
    pub dictionary: Vec<DictEntry>,
    /// Dictionary index per tile, dense in [`MapSize::index_of`] order.
    pub grid: Vec<u32>,
    /// The file started with a UTF-8 byte order mark.
    pub bom: bool,
    /// Comment lines above the first dictionary entry. A TGM header is not among them.
    pub preamble: Vec<String>,
    /// Comment lines between the last dictionary entry and the first grid block.
    pub before_grid: Vec<String>,
    pub final_newline: bool,
}

impl DmmData {
    pub fn entry_at(&self, point: Point) -> Option<&DictEntry> {
        let index = self.size.index_of(point)?;
        self.dictionary.get(self.grid[index] as usize)
    }

    /// True when dictionary keys appear in ascending key order.
    pub fn dictionary_is_sorted(&self) -> bool {
        self.dictionary
            .windows(2)
            .all(|pair| key_index(&pair[0].key) < key_index(&pair[1].key))
    }
}

/// Which flavor a save writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    /// Keep the flavor of the file being overwritten.
    #[default]
    Preserve,
    Standard,
    Tgm,
}

/// Parses `bytes` and resolves every prefab against `catalog`.
pub fn load_map(
    path: &Path,
    bytes: &[u8],
    catalog: &dyn Catalog,
) -> Result<MapDocument, DmmParseError> {
    let text = parse::decode_utf8(bytes)?;
    let data = parse_dmm(text)?;
    Ok(document_from_dmm(path, &data, catalog))
}

pub fn document_from_dmm(path: &Path, data: &DmmData, catalog: &dyn Catalog) -> MapDocument {
    let mut unknown = HashSet::<&TypePath>::new();
    let resolved = data
        .dictionary
        .iter()
        .map(|entry| {
            Tile::new(entry.prefab.iter().map(|element| {
                if catalog
                    .resolve_default_variables(&element.type_path)
                    .is_none()
                    && unknown.insert(&element.type_path)
                {
                    warn!(
                        path = %path.display(),
                        type_path = %element.type_path,
                        "map references a type the catalog does not declare"
                    );
                }
                catalog.instance(element.type_path.clone(), element.vars.clone())
            }))
        })
        .collect::<Vec<_>>();

    let tiles = data
        .grid
        .iter()
        .map(|&slot| resolved[slot as usize].clone())
        .collect();

    MapDocument::from_dense(path, data.size, data.format, tiles)
}
