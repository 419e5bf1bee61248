// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Cow;
use std::collections::HashMap;

use smol_str::SmolStr;
use thiserror::Error;
use tracing::debug;

use super::keys::{capacity, key_index, KeyAllocator, MAX_KEY_LEN};
use super::parse::{decode_utf8, TGM_HEADER};
use super::{parse_dmm, DmmData, DmmParseError, Prefab, PrefabEntry, SaveFormat};
use crate::model::{Flavor, MapDocument, MapSize, Point, Tile};

#[derive(Debug, Error)]
pub enum DmmWriteError {
    #[error("backup baseline is malformed: {0}")]
    Baseline(#[from] DmmParseError),
    #[error("map needs {needed} distinct prefabs, more than any supported key length can address")]
    KeySpaceExhausted { needed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    /// Index into the baseline dictionary.
    Baseline(usize),
    /// Index into the prefabs the baseline does not have.
    Fresh(usize),
}

struct OutEntry<'a> {
    key: SmolStr,
    slot: Slot,
    text: Cow<'a, str>,
}

/// Serializes `doc`, using `baseline` (the file as it was when loaded) to keep untouched
/// dictionary entries byte-for-byte. Comments carry over from the baseline, and so do a
/// byte order mark and a missing final newline.
pub fn save_map(
    doc: &MapDocument,
    baseline: &[u8],
    format: SaveFormat,
) -> Result<Vec<u8>, DmmWriteError> {
    let baseline = parse_dmm(decode_utf8(baseline)?)?;
    let flavor = match format {
        SaveFormat::Preserve => baseline.format.flavor,
        SaveFormat::Standard => Flavor::Standard,
        SaveFormat::Tgm => Flavor::Tgm,
    };

    let plan = plan_slots(doc, &baseline);
    let keys = assign_keys(&baseline, &plan)?;
    let entries = order_entries(&baseline, &plan, &keys, flavor);

    let key_of = entries
        .iter()
        .map(|entry| (entry.slot, entry.key.clone()))
        .collect::<HashMap<_, _>>();
    let grid = plan
        .grid
        .iter()
        .map(|slot| key_of.get(slot).map_or("", SmolStr::as_str))
        .collect::<Vec<_>>();

    debug!(
        map = %doc.id(),
        reused = plan.used.iter().filter(|used| **used).count(),
        fresh = plan.fresh.len(),
        key_len = keys.key_len,
        "serialized map"
    );

    let newline = baseline.format.line_ending.as_str();
    let push_lines = |out: &mut String, lines: &[String]| {
        for line in lines {
            out.push_str(line);
            out.push_str(newline);
        }
    };

    let mut out = String::new();
    if baseline.bom {
        out.push('\u{feff}');
    }
    if flavor == Flavor::Tgm {
        out.push_str(TGM_HEADER);
        out.push_str(newline);
    }
    push_lines(&mut out, &baseline.preamble);
    for entry in &entries {
        if let Slot::Baseline(index) = entry.slot {
            push_lines(&mut out, &baseline.dictionary[index].comments);
        }
        out.push_str(&entry.text);
        out.push_str(newline);
    }
    push_lines(&mut out, &baseline.before_grid);
    out.push_str(newline);
    match flavor {
        Flavor::Standard => write_standard_grid(&mut out, doc.size(), &grid, newline),
        Flavor::Tgm => write_tgm_grid(&mut out, doc.size(), &grid, newline),
    }
    if !baseline.final_newline {
        out.truncate(out.len() - newline.len());
    }
    Ok(out.into_bytes())
}

struct SlotPlan {
    /// One slot per document tile, in dense order.
    grid: Vec<Slot>,
    /// Which baseline dictionary entries are still referenced.
    used: Vec<bool>,
    fresh: Vec<Prefab>,
}

fn plan_slots(doc: &MapDocument, baseline: &DmmData) -> SlotPlan {
    let same_size = baseline.size == doc.size();
    let mut by_prefab = HashMap::<&Prefab, usize>::new();
    for (index, entry) in baseline.dictionary.iter().enumerate() {
        by_prefab.entry(&entry.prefab).or_insert(index);
    }

    let mut plan = SlotPlan {
        grid: Vec::with_capacity(doc.tiles().len()),
        used: vec![false; baseline.dictionary.len()],
        fresh: Vec::new(),
    };
    let mut by_tile = HashMap::<&Tile, Slot>::new();

    for (index, tile) in doc.tiles().iter().enumerate() {
        // Keep the key a tile already had when its contents did not change.
        let positional = same_size
            .then(|| baseline.grid[index] as usize)
            .filter(|&slot| tile_matches(tile, &baseline.dictionary[slot].prefab));
        let slot = match positional {
            Some(slot) => Slot::Baseline(slot),
            None => *by_tile.entry(tile).or_insert_with(|| {
                let prefab = prefab_of(tile);
                match by_prefab.get(&prefab) {
                    Some(&slot) => Slot::Baseline(slot),
                    None => {
                        plan.fresh.push(prefab);
                        Slot::Fresh(plan.fresh.len() - 1)
                    }
                }
            }),
        };
        if let Slot::Baseline(slot) = slot {
            plan.used[slot] = true;
        }
        plan.grid.push(slot);
    }
    plan
}

fn prefab_of(tile: &Tile) -> Prefab {
    tile.contents()
        .iter()
        .map(|instance| PrefabEntry {
            type_path: instance.type_path().clone(),
            vars: instance.overrides().cloned(),
        })
        .collect()
}

fn tile_matches(tile: &Tile, prefab: &Prefab) -> bool {
    tile.contents().len() == prefab.len()
        && tile
            .contents()
            .iter()
            .zip(prefab)
            .all(|(instance, entry)| {
                instance.type_path() == &entry.type_path
                    && instance.overrides() == entry.vars.as_ref()
            })
}

struct KeyPlan {
    key_len: usize,
    /// True when every kept baseline entry was re-keyed.
    rekeyed: bool,
    baseline: HashMap<usize, SmolStr>,
    fresh: Vec<SmolStr>,
}

fn assign_keys(baseline: &DmmData, plan: &SlotPlan) -> Result<KeyPlan, DmmWriteError> {
    let key_len = baseline.format.key_len;
    let used = || {
        plan.used
            .iter()
            .enumerate()
            .filter(|(_, used)| **used)
            .map(|(index, _)| index)
    };
    let kept_keys = || {
        used().map(|index| (index, baseline.dictionary[index].key.clone()))
    };

    let all_reserved = baseline
        .dictionary
        .iter()
        .filter_map(|entry| key_index(&entry.key));
    let used_reserved = used().filter_map(|index| key_index(&baseline.dictionary[index].key));

    // Prefer keys no baseline entry ever had, then keys only dropped entries had.
    for mut alloc in [
        KeyAllocator::new(key_len, all_reserved),
        KeyAllocator::new(key_len, used_reserved),
    ] {
        if alloc.free_count() >= plan.fresh.len() {
            let fresh = (0..plan.fresh.len())
                .filter_map(|_| alloc.next_key())
                .collect();
            return Ok(KeyPlan {
                key_len,
                rekeyed: false,
                baseline: kept_keys().collect(),
                fresh,
            });
        }
    }

    let needed = used().count() + plan.fresh.len();
    let grown = (key_len + 1..=MAX_KEY_LEN)
        .find(|len| capacity(*len) >= needed)
        .ok_or(DmmWriteError::KeySpaceExhausted { needed })?;

    debug!(from = key_len, to = grown, needed, "growing dictionary key length");
    let mut alloc = KeyAllocator::new(grown, std::iter::empty());
    let mut next = || alloc.next_key().unwrap_or_default();
    let baseline_keys = used().map(|index| (index, next())).collect();
    let fresh = (0..plan.fresh.len()).map(|_| next()).collect();
    Ok(KeyPlan {
        key_len: grown,
        rekeyed: true,
        baseline: baseline_keys,
        fresh,
    })
}

fn order_entries<'b>(
    baseline: &'b DmmData,
    plan: &SlotPlan,
    keys: &KeyPlan,
    flavor: Flavor,
) -> Vec<OutEntry<'b>> {
    let verbatim = flavor == baseline.format.flavor;
    let newline = baseline.format.line_ending.as_str();
    let mut entries = Vec::with_capacity(keys.baseline.len() + keys.fresh.len());

    for (index, entry) in baseline.dictionary.iter().enumerate() {
        let Some(key) = keys.baseline.get(&index) else {
            continue;
        };
        let text = if !verbatim {
            Cow::Owned(render_entry(key, &entry.prefab, flavor, newline))
        } else if keys.rekeyed {
            // `"old"` is replaced by `"new"`; the rest of the entry stays as written.
            Cow::Owned(format!("\"{key}\"{}", &entry.source[entry.key.len() + 2..]))
        } else {
            Cow::Borrowed(entry.source.as_str())
        };
        entries.push(OutEntry {
            key: key.clone(),
            slot: Slot::Baseline(index),
            text,
        });
    }

    for (index, (key, prefab)) in keys.fresh.iter().zip(&plan.fresh).enumerate() {
        entries.push(OutEntry {
            key: key.clone(),
            slot: Slot::Fresh(index),
            text: Cow::Owned(render_entry(key, prefab, flavor, newline)),
        });
    }

    if keys.rekeyed || baseline.dictionary_is_sorted() {
        entries.sort_by_key(|entry| key_index(&entry.key));
    }
    entries
}

fn render_entry(key: &str, prefab: &Prefab, flavor: Flavor, newline: &str) -> String {
    let mut out = format!("\"{key}\" = (");
    match flavor {
        Flavor::Standard => {
            for (pos, element) in prefab.iter().enumerate() {
                if pos > 0 {
                    out.push(',');
                }
                out.push_str(element.type_path.as_str());
                if let Some(vars) = &element.vars {
                    out.push('{');
                    for (var_pos, (name, value)) in vars.iter().enumerate() {
                        if var_pos > 0 {
                            out.push_str("; ");
                        }
                        out.push_str(name);
                        out.push_str(" = ");
                        out.push_str(&value.to_string());
                    }
                    out.push('}');
                }
            }
        }
        Flavor::Tgm => {
            for (pos, element) in prefab.iter().enumerate() {
                out.push_str(newline);
                out.push_str(element.type_path.as_str());
                if let Some(vars) = &element.vars {
                    out.push('{');
                    let last = vars.count() - 1;
                    for (var_pos, (name, value)) in vars.iter().enumerate() {
                        out.push_str(newline);
                        out.push('\t');
                        out.push_str(name);
                        out.push_str(" = ");
                        out.push_str(&value.to_string());
                        if var_pos < last {
                            out.push(';');
                        }
                    }
                    out.push_str(newline);
                    out.push_str("\t}");
                }
                if pos + 1 < prefab.len() {
                    out.push(',');
                }
            }
        }
    }
    out.push(')');
    out
}

fn write_standard_grid(out: &mut String, size: MapSize, grid: &[&str], newline: &str) {
    let mut coord = itoa::Buffer::new();
    for z in 1..=size.max_z {
        if z > 1 {
            out.push_str(newline);
        }
        out.push_str("(1,1,");
        out.push_str(coord.format(z));
        out.push_str(") = {\"");
        out.push_str(newline);
        for y in (1..=size.max_y).rev() {
            for x in 1..=size.max_x {
                push_key(out, size, grid, Point::new(x, y, z));
            }
            out.push_str(newline);
        }
        out.push_str("\"}");
        out.push_str(newline);
    }
}

fn write_tgm_grid(out: &mut String, size: MapSize, grid: &[&str], newline: &str) {
    let mut coord = itoa::Buffer::new();
    for z in 1..=size.max_z {
        for x in 1..=size.max_x {
            out.push('(');
            out.push_str(coord.format(x));
            out.push_str(",1,");
            out.push_str(coord.format(z));
            out.push_str(") = {\"");
            out.push_str(newline);
            for y in (1..=size.max_y).rev() {
                push_key(out, size, grid, Point::new(x, y, z));
                out.push_str(newline);
            }
            out.push_str("\"}");
            out.push_str(newline);
        }
    }
}

fn push_key(out: &mut String, size: MapSize, grid: &[&str], point: Point) {
    if let Some(key) = size.index_of(point).and_then(|index| grid.get(index)) {
        out.push_str(key);
    }
}
