// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use smol_str::SmolStr;
use thiserror::Error;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable identity of a map file, derived from its absolute path.
///
/// The hash is 64-bit FNV-1a over the path text, so the value is the same across runs and
/// toolchains (unlike `DefaultHasher`). It is the lookup key for open maps, backups, and
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(u64);

impl MapId {
    /// Hashes `path` as given; callers pass an absolute path.
    pub fn from_path(path: &Path) -> Self {
        let text = path.to_string_lossy();
        let mut hash = FNV_OFFSET_BASIS;
        for &byte in text.as_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Self(hash)
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A DM object type path such as `/obj/item/wrench`.
///
/// Only the shape is validated (leading slash, non-empty identifier segments); whether the
/// type exists is a question for the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypePath(SmolStr);

impl TypePath {
    pub fn new(value: impl AsRef<str>) -> Result<Self, TypePathError> {
        let value = value.as_ref();
        validate_type_path(value)?;
        Ok(Self(SmolStr::new(value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TypePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for TypePath {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for TypePath {
    type Err = TypePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypePathError {
    #[error("type path must not be empty")]
    Empty,
    #[error("type path must start with '/'")]
    MissingLeadingSlash,
    #[error("type path must not contain empty segments")]
    EmptySegment,
    #[error("type path contains invalid character {0:?}")]
    InvalidChar(char),
}

fn validate_type_path(value: &str) -> Result<(), TypePathError> {
    if value.is_empty() {
        return Err(TypePathError::Empty);
    }
    let Some(rest) = value.strip_prefix('/') else {
        return Err(TypePathError::MissingLeadingSlash);
    };
    for segment in rest.split('/') {
        if segment.is_empty() {
            return Err(TypePathError::EmptySegment);
        }
        if let Some(ch) = segment
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
        {
            return Err(TypePathError::InvalidChar(ch));
        }
    }
    Ok(())
}
