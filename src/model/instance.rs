// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use smol_str::SmolStr;

use super::ids::TypePath;
use super::value::VarValue;
use super::vars::Overrides;

pub const VAR_NAME: &str = "name";
pub const VAR_ICON: &str = "icon";
pub const VAR_ICON_STATE: &str = "icon_state";
pub const VAR_DIR: &str = "dir";

/// Facing, using BYOND's bit encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dir {
    North,
    #[default]
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Dir {
    pub fn from_bits(bits: i64) -> Option<Self> {
        match bits {
            1 => Some(Self::North),
            2 => Some(Self::South),
            4 => Some(Self::East),
            8 => Some(Self::West),
            5 => Some(Self::NorthEast),
            9 => Some(Self::NorthWest),
            6 => Some(Self::SouthEast),
            10 => Some(Self::SouthWest),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::North => 1,
            Self::South => 2,
            Self::East => 4,
            Self::West => 8,
            Self::NorthEast => 5,
            Self::NorthWest => 9,
            Self::SouthEast => 6,
            Self::SouthWest => 10,
        }
    }
}

/// Declared defaults for one object type, as resolved by a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectDefaults {
    vars: BTreeMap<SmolStr, VarValue>,
}

impl ObjectDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<SmolStr>, value: VarValue) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn var(&self, name: &str) -> Option<&VarValue> {
        self.vars.get(name)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &VarValue)> + '_ {
        self.vars.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// One placed (or placeable) object: its type, the display variables derived from catalog
/// defaults plus overrides, and the override set itself.
///
/// Equality covers every field, so two instances of the same type with different override
/// sets are different values. That is the fingerprint used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instance {
    type_path: TypePath,
    name: String,
    icon: String,
    icon_state: String,
    dir: Dir,
    overrides: Option<Overrides>,
}

impl Instance {
    /// Derives the display variables from `overrides` first, then `defaults`.
    ///
    /// A type the catalog does not know resolves with empty display variables.
    pub fn resolve(
        type_path: TypePath,
        overrides: Option<Overrides>,
        defaults: Option<&ObjectDefaults>,
    ) -> Self {
        let lookup = |name: &str| -> Option<&VarValue> {
            overrides
                .as_ref()
                .and_then(|vars| vars.get(name))
                .or_else(|| defaults.and_then(|defaults| defaults.var(name)))
        };
        let text = |name: &str| -> String {
            lookup(name)
                .and_then(VarValue::text)
                .map(|text| text.into_owned())
                .unwrap_or_default()
        };

        let name = text(VAR_NAME);
        let icon = text(VAR_ICON);
        let icon_state = text(VAR_ICON_STATE);
        let dir = lookup(VAR_DIR)
            .and_then(VarValue::as_int)
            .and_then(Dir::from_bits)
            .unwrap_or_default();

        Self {
            type_path,
            name,
            icon,
            icon_state,
            dir,
            overrides,
        }
    }

    /// The catalog's default instance for a type: no overrides and the default facing.
    pub fn default_of(type_path: TypePath, defaults: &ObjectDefaults) -> Self {
        let mut instance = Self::resolve(type_path, None, Some(defaults));
        instance.dir = Dir::default();
        instance
    }

    pub fn type_path(&self) -> &TypePath {
        &self.type_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn icon_state(&self) -> &str {
        &self.icon_state
    }

    pub fn dir(&self) -> Dir {
        self.dir
    }

    pub fn overrides(&self) -> Option<&Overrides> {
        self.overrides.as_ref()
    }

    pub fn override_count(&self) -> usize {
        self.overrides.as_ref().map_or(0, Overrides::count)
    }
}

#[cfg(test)]
mod tests {
    use super::{Dir, Instance, ObjectDefaults};
    use crate::model::{Overrides, TypePath, VarValue};

    fn wrench_defaults() -> ObjectDefaults {
        ObjectDefaults::new()
            .with_var("name", VarValue::string("wrench"))
            .with_var("icon", VarValue::resource("icons/obj/tools.dmi"))
            .with_var("icon_state", VarValue::string("wrench"))
    }

    #[test]
    fn resolve_prefers_overrides_over_defaults() {
        let overrides = Overrides::from_entries([
            ("name", VarValue::string("golden wrench")),
            ("dir", VarValue::number(4)),
        ]);
        let instance = Instance::resolve(
            TypePath::new("/obj/item/wrench").unwrap(),
            overrides,
            Some(&wrench_defaults()),
        );

        assert_eq!(instance.name(), "golden wrench");
        assert_eq!(instance.icon(), "icons/obj/tools.dmi");
        assert_eq!(instance.icon_state(), "wrench");
        assert_eq!(instance.dir(), Dir::East);
        assert_eq!(instance.override_count(), 2);
    }

    #[test]
    fn unknown_type_resolves_with_empty_display_vars() {
        let instance = Instance::resolve(TypePath::new("/obj/missing").unwrap(), None, None);
        assert_eq!(instance.name(), "");
        assert_eq!(instance.dir(), Dir::South);
    }

    #[test]
    fn default_instance_equals_plain_placed_instance() {
        let path = TypePath::new("/obj/item/wrench").unwrap();
        let defaults = wrench_defaults();
        assert_eq!(
            Instance::default_of(path.clone(), &defaults),
            Instance::resolve(path, None, Some(&defaults))
        );
    }

    #[test]
    fn dir_bits_round_trip() {
        for bits in [1, 2, 4, 8, 5, 6, 9, 10] {
            assert_eq!(Dir::from_bits(bits).map(|dir| i64::from(dir.bits())), Some(bits));
        }
        assert_eq!(Dir::from_bits(3), None);
    }
}
