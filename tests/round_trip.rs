// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fs;
use std::path::{Path, PathBuf};

use rstest::rstest;
use tilewright::catalog::{Catalog, MemoryCatalog};
use tilewright::format::dmm::{load_map, save_map, SaveFormat};
use tilewright::model::{
    Flavor, MapDocument, ObjectDefaults, Overrides, Point, TypePath, VarValue,
};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn read_fixture(name: &str) -> (PathBuf, Vec<u8>) {
    let path = fixtures_dir().join(name);
    let bytes = fs::read(&path).unwrap_or_else(|err| panic!("failed to read {path:?}: {err}"));
    (path, bytes)
}

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new(fixtures_dir()).with_object(
        TypePath::new("/obj/item/wrench").unwrap(),
        ObjectDefaults::new()
            .with_var("name", VarValue::string("wrench"))
            .with_var("icon_state", VarValue::string("wrench")),
    )
}

fn load(path: &Path, bytes: &[u8]) -> MapDocument {
    load_map(path, bytes, &catalog())
        .unwrap_or_else(|err| panic!("expected {path:?} to load, got error: {err}"))
}

#[rstest]
#[case::standard("maps/outpost.dmm", Flavor::Standard)]
#[case::tgm("maps/away/beach.dmm", Flavor::Tgm)]
fn unedited_maps_save_byte_for_byte(#[case] name: &str, #[case] flavor: Flavor) {
    let (path, bytes) = read_fixture(name);
    let doc = load(&path, &bytes);
    assert_eq!(doc.format().flavor, flavor);

    let saved = save_map(&doc, &bytes, SaveFormat::Preserve).unwrap();
    assert_eq!(String::from_utf8(saved).unwrap(), String::from_utf8(bytes).unwrap());
}

#[rstest]
#[case::standard_to_tgm("maps/outpost.dmm", SaveFormat::Tgm, Flavor::Tgm)]
#[case::tgm_to_standard("maps/away/beach.dmm", SaveFormat::Standard, Flavor::Standard)]
fn converting_flavors_keeps_every_tile(
    #[case] name: &str,
    #[case] format: SaveFormat,
    #[case] flavor: Flavor,
) {
    let (path, bytes) = read_fixture(name);
    let doc = load(&path, &bytes);

    let converted = save_map(&doc, &bytes, format).unwrap();
    let reloaded = load(&path, &converted);
    assert_eq!(reloaded.format().flavor, flavor);
    assert!(reloaded.same_content(&doc));

    // Saving the converted document over the original restores the original text.
    let back = save_map(&reloaded, &bytes, SaveFormat::Preserve).unwrap();
    assert_eq!(back, bytes);
}

#[test]
fn edits_only_touch_the_entries_they_need() {
    let (path, bytes) = read_fixture("maps/outpost.dmm");
    let mut doc = load(&path, &bytes);
    let catalog = catalog();

    // The golden wrench leaves (3,2,1); the plain wrench left behind needs a new prefab.
    let removed = doc.remove_instance(Point::new(3, 2, 1), 1).unwrap();
    assert_eq!(removed.name(), "golden wrench");
    // A new wrench variant lands on an outer space tile.
    let fancy = catalog.instance(
        TypePath::new("/obj/item/wrench").unwrap(),
        Overrides::from_entries([("name", VarValue::string("rusty wrench"))]),
    );
    doc.push_instance(Point::new(1, 1, 2), fancy).unwrap();

    let saved = String::from_utf8(save_map(&doc, &bytes, SaveFormat::Preserve).unwrap()).unwrap();
    let original = String::from_utf8(bytes).unwrap();

    let lines = saved.lines().collect::<Vec<_>>();
    for kept in original.lines().take(3) {
        assert!(lines.contains(&kept), "expected {kept:?} to survive verbatim");
    }
    assert!(saved.contains(
        "\"g\" = (/obj/item/wrench,/turf/floor,/area/outpost)\n\"h\" = (/turf/space,/area/space,/obj/item/wrench{name = \"rusty wrench\"})\n"
    ));
    assert!(!saved.contains("golden wrench"));
    assert!(load(&path, saved.as_bytes()).same_content(&doc));
}
