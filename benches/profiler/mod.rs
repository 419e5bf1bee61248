// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::str::FromStr;
use std::time::Duration;

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// Criterion tuned through `BENCH_*` variables. Set `TILEWRIGHT_PROFILE_FREQ` to also write
/// a flamegraph per benchmark.
pub fn criterion() -> Criterion {
    let sample_size = env_or("BENCH_SAMPLE_SIZE", 50usize).clamp(10, 200);
    let warmup = env_or("BENCH_WARMUP_SECS", 2u64).clamp(1, 60);
    let measurement = env_or("BENCH_MEASUREMENT_SECS", 5u64).clamp(1, 120);

    let criterion = Criterion::default()
        .sample_size(sample_size)
        .warm_up_time(Duration::from_secs(warmup))
        .measurement_time(Duration::from_secs(measurement));

    match std::env::var("TILEWRIGHT_PROFILE_FREQ") {
        Ok(_) => {
            let frequency = env_or("TILEWRIGHT_PROFILE_FREQ", 100i32).clamp(1, 1000);
            criterion.with_profiler(PProfProfiler::new(frequency, Output::Flamegraph(None)))
        }
        Err(_) => criterion,
    }
}
