// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt::Write as _;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tilewright::catalog::MemoryCatalog;
use tilewright::format::dmm::{key_at, load_map, parse_dmm, save_map, SaveFormat};
use tilewright::model::{Point, TypePath};

mod profiler;

/// A square single-level map with `prefabs` distinct dictionary entries spread over the grid.
fn synthetic_map(side: u32, prefabs: usize) -> String {
    let key_len = if prefabs <= 52 { 1 } else { 2 };
    let mut out = String::new();
    for index in 0..prefabs {
        let _ = writeln!(
            out,
            "\"{}\" = (/obj/item{{name = \"item {index}\"; pixel_x = {}}},/turf/floor)",
            key_at(index, key_len),
            index % 16
        );
    }
    out.push_str("\n(1,1,1) = {\"\n");
    for y in 0..side {
        for x in 0..side {
            let index = (x as usize * 31 + y as usize * 17) % prefabs;
            out.push_str(&key_at(index, key_len));
        }
        out.push('\n');
    }
    out.push_str("\"}\n");
    out
}

// Benchmark identity (keep stable): groups `format.parse_dmm`, `format.load_map`,
// `format.save_map`; case IDs `small`, `station`.
fn benches_dmm(c: &mut Criterion) {
    let cases = [("small", synthetic_map(32, 40)), ("station", synthetic_map(255, 1500))];
    let catalog = MemoryCatalog::new("/bench");
    let path = Path::new("/bench/station.dmm");

    {
        let mut group = c.benchmark_group("format.parse_dmm");
        for (case_id, text) in &cases {
            group.throughput(Throughput::Bytes(text.len() as u64));
            group.bench_function(*case_id, |b| {
                b.iter(|| parse_dmm(black_box(text)).expect("parse_dmm"))
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("format.load_map");
        for (case_id, text) in &cases {
            group.throughput(Throughput::Bytes(text.len() as u64));
            group.bench_function(*case_id, |b| {
                b.iter(|| load_map(path, black_box(text.as_bytes()), &catalog).expect("load_map"))
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("format.save_map");
        let floor = TypePath::new("/turf/floor").expect("type path");
        for (case_id, text) in &cases {
            let mut doc = load_map(path, text.as_bytes(), &catalog).expect("load_map");
            for x in 1..=8 {
                let instance = tilewright::catalog::Catalog::instance(&catalog, floor.clone(), None);
                doc.push_instance(Point::new(x, 1, 1), instance).expect("edit");
            }
            group.throughput(Throughput::Bytes(text.len() as u64));
            group.bench_function(format!("{case_id}/edited"), |b| {
                b.iter(|| {
                    save_map(black_box(&doc), text.as_bytes(), SaveFormat::Preserve)
                        .expect("save_map")
                })
            });
            group.bench_function(format!("{case_id}/to_tgm"), |b| {
                b.iter(|| save_map(black_box(&doc), text.as_bytes(), SaveFormat::Tgm).expect("save_map"))
            });
        }
        group.finish();
    }
}

criterion_group! {
    name = benches;
    config = profiler::criterion();
    targets = benches_dmm
}
criterion_main!(benches);
