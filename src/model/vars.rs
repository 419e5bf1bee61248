// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::hash::{Hash, Hasher};

use smallvec::SmallVec;
use smol_str::SmolStr;

use super::value::VarValue;

/// Variables an instance sets on top of its catalog defaults.
///
/// Entries keep the order they were written in so saving reproduces the source layout, but
/// equality and hashing ignore order: `{a = 1; b = 2}` and `{b = 2; a = 1}` are the same
/// fingerprint. An `Overrides` value is never empty; "no overrides" is `Option::None`.
#[derive(Debug, Clone)]
pub struct Overrides {
    entries: SmallVec<[(SmolStr, VarValue); 2]>,
}

impl Overrides {
    /// Builds an override set, or `None` when there are no entries.
    ///
    /// A repeated name replaces the earlier value in place.
    pub fn from_entries<N, I>(entries: I) -> Option<Self>
    where
        N: Into<SmolStr>,
        I: IntoIterator<Item = (N, VarValue)>,
    {
        let mut out = SmallVec::<[(SmolStr, VarValue); 2]>::new();
        for (name, value) in entries {
            let name = name.into();
            match out.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => out.push((name, value)),
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(Self { entries: out })
        }
    }

    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarValue)> + '_ {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn with(mut self, name: impl Into<SmolStr>, value: VarValue) -> Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Drops `name`; returns `None` when that was the last entry.
    pub fn without(mut self, name: &str) -> Option<Self> {
        self.entries.retain(|(existing, _)| existing != name);
        if self.entries.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl PartialEq for Overrides {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl Eq for Overrides {}

impl Hash for Overrides {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut sorted = self.entries.iter().collect::<SmallVec<[_; 4]>>();
        sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        sorted.len().hash(state);
        for (name, value) in sorted {
            name.hash(state);
            value.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::Overrides;
    use crate::model::VarValue;

    fn hash_of(value: &Overrides) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn empty_entries_normalize_to_none() {
        let none = Overrides::from_entries(Vec::<(&str, VarValue)>::new());
        assert!(none.is_none());
    }

    #[test]
    fn equality_and_hash_ignore_order() {
        let a = Overrides::from_entries([
            ("color", VarValue::string("red")),
            ("dir", VarValue::number(4)),
        ])
        .unwrap();
        let b = Overrides::from_entries([
            ("dir", VarValue::number(4)),
            ("color", VarValue::string("red")),
        ])
        .unwrap();

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.iter().next().map(|(name, _)| name), Some("color"));
    }

    #[test]
    fn differing_values_are_distinct() {
        let red = Overrides::from_entries([("color", VarValue::string("red"))]).unwrap();
        let blue = Overrides::from_entries([("color", VarValue::string("blue"))]).unwrap();
        assert_ne!(red, blue);
    }

    #[test]
    fn repeated_name_replaces_in_place() {
        let vars = Overrides::from_entries([
            ("a", VarValue::number(1)),
            ("b", VarValue::number(2)),
            ("a", VarValue::number(3)),
        ])
        .unwrap();

        assert_eq!(vars.count(), 2);
        assert_eq!(vars.get("a"), Some(&VarValue::number(3)));
    }

    #[test]
    fn without_last_entry_collapses_to_none() {
        let vars = Overrides::from_entries([("a", VarValue::number(1))]).unwrap();
        assert!(vars.without("a").is_none());
    }
}
