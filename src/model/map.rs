// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::path::{Path, PathBuf};

use smallvec::SmallVec;
use thiserror::Error;

use super::ids::{MapId, TypePath};
use super::instance::Instance;

/// A 1-based tile coordinate, as written in map files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Point {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapSize {
    pub max_x: u32,
    pub max_y: u32,
    pub max_z: u32,
}

impl MapSize {
    pub fn new(max_x: u32, max_y: u32, max_z: u32) -> Self {
        Self {
            max_x,
            max_y,
            max_z,
        }
    }

    pub fn tile_count(&self) -> usize {
        self.max_x as usize * self.max_y as usize * self.max_z as usize
    }

    pub fn contains(&self, point: Point) -> bool {
        (1..=self.max_x).contains(&point.x)
            && (1..=self.max_y).contains(&point.y)
            && (1..=self.max_z).contains(&point.z)
    }

    /// Dense index, x fastest, then y, then z.
    pub fn index_of(&self, point: Point) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        let x = (point.x - 1) as usize;
        let y = (point.y - 1) as usize;
        let z = (point.z - 1) as usize;
        Some((z * self.max_y as usize + y) * self.max_x as usize + x)
    }

    pub fn point_at(&self, index: usize) -> Point {
        let width = self.max_x as usize;
        let plane = width * self.max_y as usize;
        let z = index / plane;
        let rest = index % plane;
        Point::new(
            (rest % width) as u32 + 1,
            (rest / width) as u32 + 1,
            z as u32 + 1,
        )
    }
}

impl fmt::Display for MapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.max_x, self.max_y, self.max_z)
    }
}

/// Which textual layout a map file uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// One prefab per line, one grid block per z-level.
    #[default]
    Standard,
    /// The dmm2tgm layout: one variable per line, one grid block per column.
    Tgm,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Layout facts about the file a document was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceFormat {
    pub flavor: Flavor,
    pub key_len: usize,
    pub line_ending: LineEnding,
}

/// One tile's contents, bottom to top (paint order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tile {
    contents: SmallVec<[Instance; 4]>,
}

impl Tile {
    pub fn new(contents: impl IntoIterator<Item = Instance>) -> Self {
        Self {
            contents: contents.into_iter().collect(),
        }
    }

    pub fn contents(&self) -> &[Instance] {
        &self.contents
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapEditError {
    #[error("point {point} is outside the {size} map")]
    OutOfBounds { point: Point, size: MapSize },
    #[error("tile {point} has no instance at index {index}")]
    NoSuchInstance { point: Point, index: usize },
    #[error("expected {expected} tiles for a {size} map, got {found}")]
    TileCountMismatch {
        size: MapSize,
        expected: usize,
        found: usize,
    },
}

/// An open map: a dense grid of tile stacks plus what is needed to save it faithfully.
///
/// Every mutation bumps `rev`; the document is dirty while `rev` differs from the revision
/// last written to disk.
#[derive(Debug, Clone)]
pub struct MapDocument {
    id: MapId,
    source_path: PathBuf,
    size: MapSize,
    format: SourceFormat,
    tiles: Vec<Tile>,
    rev: u64,
    saved_rev: u64,
}

impl MapDocument {
    pub fn new(
        source_path: impl Into<PathBuf>,
        size: MapSize,
        format: SourceFormat,
        tiles: Vec<Tile>,
    ) -> Result<Self, MapEditError> {
        let expected = size.tile_count();
        if tiles.len() != expected {
            return Err(MapEditError::TileCountMismatch {
                size,
                expected,
                found: tiles.len(),
            });
        }
        Ok(Self::from_dense(source_path, size, format, tiles))
    }

    /// Builds a document from a grid the caller already sized to `size`.
    pub(crate) fn from_dense(
        source_path: impl Into<PathBuf>,
        size: MapSize,
        format: SourceFormat,
        tiles: Vec<Tile>,
    ) -> Self {
        debug_assert_eq!(tiles.len(), size.tile_count());
        let source_path = source_path.into();
        Self {
            id: MapId::from_path(&source_path),
            source_path,
            size,
            format,
            tiles,
            rev: 0,
            saved_rev: 0,
        }
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn size(&self) -> MapSize {
        self.size
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn rev(&self) -> u64 {
        self.rev
    }

    pub fn is_dirty(&self) -> bool {
        self.rev != self.saved_rev
    }

    /// Records that revision `rev` is on disk. Edits made after that revision keep the
    /// document dirty.
    pub fn mark_saved(&mut self, rev: u64) {
        self.saved_rev = rev;
    }

    pub fn tile(&self, point: Point) -> Option<&Tile> {
        self.size.index_of(point).map(|index| &self.tiles[index])
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn iter_tiles(&self) -> impl Iterator<Item = (Point, &Tile)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(|(index, tile)| (self.size.point_at(index), tile))
    }

    pub fn instances_of_type<'a>(
        &'a self,
        type_path: &'a TypePath,
    ) -> impl Iterator<Item = &'a Instance> + 'a {
        self.tiles
            .iter()
            .flat_map(|tile| tile.contents.iter())
            .filter(move |instance| instance.type_path() == type_path)
    }

    /// Tile-for-tile, instance-for-instance comparison, ignoring path and revisions.
    pub fn same_content(&self, other: &MapDocument) -> bool {
        self.size == other.size && self.tiles == other.tiles
    }

    pub fn push_instance(&mut self, point: Point, instance: Instance) -> Result<(), MapEditError> {
        let index = self.checked_index(point)?;
        self.tiles[index].contents.push(instance);
        self.bump_rev();
        Ok(())
    }

    pub fn remove_instance(
        &mut self,
        point: Point,
        position: usize,
    ) -> Result<Instance, MapEditError> {
        let index = self.checked_index(point)?;
        let contents = &mut self.tiles[index].contents;
        if position >= contents.len() {
            return Err(MapEditError::NoSuchInstance {
                point,
                index: position,
            });
        }
        let removed = contents.remove(position);
        self.bump_rev();
        Ok(removed)
    }

    pub fn replace_tile(&mut self, point: Point, tile: Tile) -> Result<Tile, MapEditError> {
        let index = self.checked_index(point)?;
        let previous = std::mem::replace(&mut self.tiles[index], tile);
        self.bump_rev();
        Ok(previous)
    }

    fn checked_index(&self, point: Point) -> Result<usize, MapEditError> {
        self.size
            .index_of(point)
            .ok_or(MapEditError::OutOfBounds {
                point,
                size: self.size,
            })
    }

    fn bump_rev(&mut self) {
        self.rev = self.rev.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{Flavor, LineEnding, MapDocument, MapEditError, MapSize, Point, SourceFormat, Tile};
    use crate::model::{Instance, TypePath};

    fn format() -> SourceFormat {
        SourceFormat {
            flavor: Flavor::Standard,
            key_len: 1,
            line_ending: LineEnding::Lf,
        }
    }

    fn floor() -> Instance {
        Instance::resolve(TypePath::new("/turf/floor").unwrap(), None, None)
    }

    fn doc() -> MapDocument {
        let size = MapSize::new(3, 2, 1);
        let tiles = vec![Tile::new([floor()]); size.tile_count()];
        MapDocument::new("/maps/a.dmm", size, format(), tiles).unwrap()
    }

    #[test]
    fn index_and_point_are_inverse() {
        let size = MapSize::new(3, 2, 2);
        for index in 0..size.tile_count() {
            assert_eq!(size.index_of(size.point_at(index)), Some(index));
        }
        assert_eq!(size.index_of(Point::new(4, 1, 1)), None);
        assert_eq!(size.index_of(Point::new(0, 1, 1)), None);
    }

    #[test]
    fn edits_mark_dirty_until_saved_revision_matches() {
        let mut doc = doc();
        assert!(!doc.is_dirty());

        doc.push_instance(Point::new(1, 1, 1), floor()).unwrap();
        let saved = doc.rev();
        assert!(doc.is_dirty());

        doc.remove_instance(Point::new(1, 1, 1), 1).unwrap();
        doc.mark_saved(saved);
        assert!(doc.is_dirty());

        doc.mark_saved(doc.rev());
        assert!(!doc.is_dirty());
    }

    #[test]
    fn out_of_bounds_edit_is_rejected_without_bumping_rev() {
        let mut doc = doc();
        let err = doc.push_instance(Point::new(9, 9, 9), floor()).unwrap_err();
        assert!(matches!(err, MapEditError::OutOfBounds { .. }));
        assert_eq!(doc.rev(), 0);
    }

    #[test]
    fn new_rejects_wrong_tile_count() {
        let err = MapDocument::new("/maps/a.dmm", MapSize::new(2, 2, 1), format(), Vec::new())
            .unwrap_err();
        assert!(matches!(err, MapEditError::TileCountMismatch { expected: 4, .. }));
    }
}
