//! # Mantra Performance Benchmarks
//!
//! - **Generation**: template filling, custom mode and the wizard filter
//! - **Ordering**: Fisher–Yates shuffles of growing playlists
//! - **Playlists**: export and import of a large library
//!
//! ```bash
//! cargo bench
//! cargo bench generation
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

use mantra::generator::{filter_for_wizard, Generator};
use mantra::order::compute_order;
use mantra::playlist::{PlaylistStore, Track};

fn benchmark_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    let generator = Generator::new().expect("builtin categories are valid");
    let mut rng = StdRng::seed_from_u64(42);

    group.bench_function("template_confidence", |b| {
        b.iter(|| {
            generator
                .generate_with_rng(black_box("confidence"), black_box("I am shy and nervous"), &mut rng)
                .unwrap()
        });
    });

    group.bench_function("custom_fitness", |b| {
        b.iter(|| {
            generator
                .generate_custom_with_rng(black_box("fitness"), black_box("I hate running"), &mut rng)
                .unwrap()
        });
    });

    group.bench_function("wizard_filter", |b| {
        let lines = generator.generate_with_rng("sleep", "I can't sleep", &mut rng).unwrap();
        b.iter(|| filter_for_wizard(black_box(lines.clone())).unwrap());
    });

    group.finish();
}

fn benchmark_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordering");
    let mut rng = StdRng::seed_from_u64(7);

    for len in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("shuffle", len), &len, |b, &len| {
            b.iter(|| compute_order(black_box(len), true, &mut rng));
        });
    }

    group.finish();
}

fn benchmark_playlists(c: &mut Criterion) {
    let mut group = c.benchmark_group("playlists");

    let mut store = PlaylistStore::new();
    for p in 0..20 {
        let id = store.create(&format!("playlist {p}"));
        for t in 0..50 {
            store
                .add_track(id, Track::new(format!("track {t}"), format!("recording:{}", p * 50 + t)))
                .unwrap();
        }
    }
    let json = store.export_all().unwrap();

    group.bench_function("export_all", |b| b.iter(|| black_box(&store).export_all().unwrap()));

    group.bench_function("import_all", |b| {
        b.iter(|| {
            let mut target = PlaylistStore::new();
            target.import(black_box(&json)).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_generation, benchmark_ordering, benchmark_playlists);
criterion_main!(benches);
