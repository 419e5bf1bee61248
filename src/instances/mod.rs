// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Aggregation of the distinct variants of one object type across every open map.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::catalog::Catalog;
use crate::holder::{HolderError, MapHolder};
use crate::model::{Instance, MapDocument, Overrides, TypePath};

/// The catalog default for `type_path` followed by every distinct placed variant.
///
/// Placed occurrences are re-projected through `catalog`, deduplicated by full instance
/// equality and sorted by icon state, then override count, then name. The default stays
/// first. Returns `None` when the catalog does not declare the type.
pub fn find_instances_of_type(
    catalog: &dyn Catalog,
    maps: &[Arc<MapDocument>],
    type_path: &TypePath,
) -> Option<Vec<Instance>> {
    let default = catalog.default_instance(type_path)?;

    // Distinct override sets per map, in scan order.
    let per_map = maps
        .par_iter()
        .map(|doc| {
            let mut seen = HashSet::new();
            doc.instances_of_type(type_path)
                .map(Instance::overrides)
                .filter(|overrides| seen.insert(*overrides))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut seen = HashSet::from([default.clone()]);
    let mut variants = Vec::new();
    for overrides in per_map.into_iter().flatten() {
        let instance = catalog.instance(type_path.clone(), overrides.cloned());
        if seen.insert(instance.clone()) {
            variants.push(instance);
        }
    }
    variants.sort_by(display_order);

    debug!(
        type_path = %type_path,
        maps = maps.len(),
        variants = variants.len(),
        "aggregated instances"
    );

    let mut out = Vec::with_capacity(variants.len() + 1);
    out.push(default);
    out.extend(variants);
    Some(out)
}

fn display_order(a: &Instance, b: &Instance) -> Ordering {
    a.icon_state()
        .cmp(b.icon_state())
        .then(a.override_count().cmp(&b.override_count()))
        .then_with(|| a.name().cmp(b.name()))
}

/// Aggregates against the maps currently open in `holder`, using its installed catalog.
///
/// The scan runs on the blocking pool over a snapshot of the open maps.
pub async fn find_in_open_maps(
    holder: &MapHolder,
    type_path: TypePath,
) -> Result<Option<Vec<Instance>>, HolderError> {
    let Some(catalog) = holder.catalog() else {
        return Ok(None);
    };
    let maps = holder.read_maps(|maps| maps.to_vec()).await?;
    tokio::task::spawn_blocking(move || find_instances_of_type(catalog.as_ref(), &maps, &type_path))
        .await
        .map_err(|_| HolderError::Stopped)
}

/// The instance picker's state: the aggregated variants of one type and which is selected.
#[derive(Debug, Clone, Default)]
pub struct InstanceList {
    type_path: Option<TypePath>,
    instances: Vec<Instance>,
    selected: Option<usize>,
}

impl InstanceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregates `type_path` and selects its default instance. Returns the entry count,
    /// zero when the type is unknown.
    pub fn find_and_select(
        &mut self,
        catalog: &dyn Catalog,
        maps: &[Arc<MapDocument>],
        type_path: &TypePath,
    ) -> usize {
        match find_instances_of_type(catalog, maps, type_path) {
            Some(instances) => {
                self.type_path = Some(type_path.clone());
                self.instances = instances;
                self.selected = Some(0);
            }
            None => self.clear(),
        }
        self.count()
    }

    /// Selects the first entry whose override set equals `overrides`.
    pub fn select_by_overrides(&mut self, overrides: Option<&Overrides>) -> Option<usize> {
        let index = self
            .instances
            .iter()
            .position(|instance| instance.overrides() == overrides)?;
        self.selected = Some(index);
        Some(index)
    }

    /// Re-runs the aggregation for the current type, e.g. after a map was opened or closed.
    /// The selection follows its override set, falling back to the default.
    pub fn refresh(&mut self, catalog: &dyn Catalog, maps: &[Arc<MapDocument>]) -> usize {
        let Some(type_path) = self.type_path.clone() else {
            return 0;
        };
        let previous = self.selected().and_then(|instance| instance.overrides().cloned());
        self.find_and_select(catalog, maps, &type_path);
        if previous.is_some() && self.select_by_overrides(previous.as_ref()).is_none() {
            self.selected = (!self.instances.is_empty()).then_some(0);
        }
        self.count()
    }

    pub fn clear(&mut self) {
        self.type_path = None;
        self.instances.clear();
        self.selected = None;
    }

    pub fn type_path(&self) -> Option<&TypePath> {
        self.type_path.as_ref()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn selected(&self) -> Option<&Instance> {
        self.selected.and_then(|index| self.instances.get(index))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn count(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::{fixture, rstest};

    use super::{find_instances_of_type, InstanceList};
    use crate::catalog::{Catalog, MemoryCatalog};
    use crate::model::{
        Dir, Flavor, Instance, LineEnding, MapDocument, MapSize, ObjectDefaults, Overrides,
        SourceFormat, Tile, TypePath, VarValue,
    };

    fn cat() -> TypePath {
        TypePath::new("/mob/cat").unwrap()
    }

    #[fixture]
    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new("/project").with_object(
            cat(),
            ObjectDefaults::new()
                .with_var("name", VarValue::string("cat"))
                .with_var("icon_state", VarValue::string("idle")),
        )
    }

    fn placed(catalog: &MemoryCatalog, vars: &[(&str, VarValue)]) -> Instance {
        let overrides = Overrides::from_entries(vars.iter().map(|(n, v)| (*n, v.clone())));
        catalog.instance(cat(), overrides)
    }

    fn map(name: &str, instances: Vec<Instance>) -> Arc<MapDocument> {
        let size = MapSize::new(instances.len() as u32, 1, 1);
        let format = SourceFormat {
            flavor: Flavor::Standard,
            key_len: 1,
            line_ending: LineEnding::Lf,
        };
        let tiles = instances.into_iter().map(|i| Tile::new([i])).collect();
        Arc::new(MapDocument::new(format!("/project/{name}.dmm"), size, format, tiles).unwrap())
    }

    fn red() -> (&'static str, VarValue) {
        ("color", VarValue::string("red"))
    }

    #[rstest]
    fn identical_overrides_collapse(catalog: MemoryCatalog) {
        let maps = [
            map("a", vec![placed(&catalog, &[red()])]),
            map("b", vec![placed(&catalog, &[red()])]),
        ];
        let found = find_instances_of_type(&catalog, &maps, &cat()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].overrides().is_none());
        assert_eq!(found[1].override_count(), 1);
    }

    #[rstest]
    fn different_overrides_stay_apart(catalog: MemoryCatalog) {
        let blue = ("color", VarValue::string("blue"));
        let maps = [map(
            "a",
            vec![placed(&catalog, &[red()]), placed(&catalog, &[blue])],
        )];
        let found = find_instances_of_type(&catalog, &maps, &cat()).unwrap();
        assert_eq!(found.len(), 3);
    }

    #[rstest]
    fn variants_sort_by_state_then_override_count(catalog: MemoryCatalog) {
        let walk = placed(&catalog, &[("icon_state", VarValue::string("walk"))]);
        let fancy = placed(&catalog, &[red(), ("name", VarValue::string("fancy cat"))]);
        let plain_east = placed(&catalog, &[("dir", VarValue::number(4))]);
        let maps = [map("a", vec![walk, fancy, plain_east])];

        let found = find_instances_of_type(&catalog, &maps, &cat()).unwrap();
        let summary = found
            .iter()
            .map(|i| (i.icon_state(), i.override_count()))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![("idle", 0), ("idle", 1), ("idle", 2), ("walk", 1)]
        );
        assert_eq!(found[0].dir(), Dir::South);
        assert_eq!(found[1].dir(), Dir::East);
    }

    #[rstest]
    fn ties_break_on_name(catalog: MemoryCatalog) {
        let zed = placed(&catalog, &[("name", VarValue::string("zed"))]);
        let abe = placed(&catalog, &[("name", VarValue::string("abe"))]);
        let maps = [map("a", vec![zed, abe])];

        let found = find_instances_of_type(&catalog, &maps, &cat()).unwrap();
        let names = found.iter().map(Instance::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["cat", "abe", "zed"]);
    }

    #[rstest]
    fn placed_instance_without_overrides_merges_with_default(catalog: MemoryCatalog) {
        let maps = [map("a", vec![catalog.instance(cat(), None)])];
        let found = find_instances_of_type(&catalog, &maps, &cat()).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[rstest]
    fn unknown_type_finds_nothing(catalog: MemoryCatalog) {
        let dog = TypePath::new("/mob/dog").unwrap();
        assert!(find_instances_of_type(&catalog, &[], &dog).is_none());

        let mut list = InstanceList::new();
        assert_eq!(list.find_and_select(&catalog, &[], &dog), 0);
        assert!(list.selected().is_none());
        assert!(list.type_path().is_none());
    }

    #[rstest]
    fn list_selection_follows_overrides_across_refresh(catalog: MemoryCatalog) {
        let red_cat = placed(&catalog, &[red()]);
        let with_red = [map("a", vec![red_cat.clone()])];

        let mut list = InstanceList::new();
        assert_eq!(list.find_and_select(&catalog, &with_red, &cat()), 2);
        assert_eq!(list.selected_index(), Some(0));

        let red_overrides = red_cat.overrides().cloned();
        assert_eq!(list.select_by_overrides(red_overrides.as_ref()), Some(1));
        assert_eq!(list.refresh(&catalog, &with_red), 2);
        assert_eq!(list.selected(), Some(&red_cat));

        // The map holding the red cat closed: selection falls back to the default.
        assert_eq!(list.refresh(&catalog, &[]), 1);
        assert_eq!(list.selected_index(), Some(0));

        list.clear();
        assert_eq!(list.count(), 0);
        assert_eq!(list.refresh(&catalog, &with_red), 0);
    }
}
