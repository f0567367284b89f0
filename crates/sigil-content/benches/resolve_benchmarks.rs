//! Overlay resolution benchmarks.
//!
//! Measures the merge pass for a base manifest of 1K scripts against a
//! growing number of overlays, each overriding 10% of the base paths and
//! adding a handful of new ones.
//!
//! Run with: `cargo bench --bench resolve_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sigil_content::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config() -> ResolverConfig {
    ResolverConfig {
        content_root: "/content".into(),
        mods_root: "/mods".into(),
        ..Default::default()
    }
}

/// Build a store with `base_count` base scripts and `overlay_count` overlays.
fn setup(base_count: usize, overlay_count: usize) -> (MemoryFileStore, BaseManifest, Vec<OverlaySource>) {
    let mut store = MemoryFileStore::new();
    let mut manifest = BaseManifest::default();

    for i in 0..base_count {
        let logical = format!("scripts/s{i:04}.vs");
        store.add_file(format!("/content/{logical}"));
        if i % 4 == 0 {
            manifest.state_machines.push(logical);
        } else {
            manifest.level_scripts.push(logical);
        }
    }

    let mut overlays = Vec::with_capacity(overlay_count);
    for o in 0..overlay_count {
        for i in (0..base_count).filter(|i| (i + o) % 10 == 0) {
            store.add_file(format!("/mods/{o}.sbm/VisualScripts/scripts/s{i:04}.vs"));
        }
        for j in 0..5 {
            store.add_file(format!("/mods/{o}.sbm/VisualScripts/extra/o{o}_{j}.vsc"));
        }
        overlays.push(OverlaySource::new(o as u64, format!("overlay_{o}")));
    }

    (store, manifest, overlays)
}

// ---------------------------------------------------------------------------
// Benchmark 1: base manifest only
// ---------------------------------------------------------------------------

fn bench_resolve_base_only(c: &mut Criterion) {
    let (store, manifest, _) = setup(1000, 0);
    let config = config();

    c.bench_function("resolve_base_1k", |b| {
        b.iter(|| {
            let resolved = OverlayResolver::new(&store, &config).resolve(&manifest, &[]);
            black_box(resolved.len());
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 2: scaling with overlay count
// ---------------------------------------------------------------------------

fn bench_resolve_overlay_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_overlay_scaling");
    let config = config();

    for overlay_count in [1usize, 4, 16] {
        let (store, manifest, overlays) = setup(1000, overlay_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(overlay_count),
            &overlay_count,
            |b, _| {
                b.iter(|| {
                    let resolved =
                        OverlayResolver::new(&store, &config).resolve(&manifest, &overlays);
                    black_box(resolved.report().overridden);
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_resolve_base_only, bench_resolve_overlay_scaling);
criterion_main!(benches);
