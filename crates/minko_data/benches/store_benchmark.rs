//! Benchmark for store notification and lookup throughput.
//!
//! TARGET: property writes on observed paths stay well under a microsecond
//!
//! Run with: cargo bench --package minko_data --bench store_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use minko_data::{Collection, Provider, Store};

fn benchmark_observed_write(c: &mut Criterion) {
    let store = Store::new();
    let material = Provider::new();
    material.set("diffuseColor", [0.0f32; 4]);
    store.add_provider_to_collection(&material, "material");
    let _slot = store
        .property_changed_at("material[0].diffuseColor")
        .connect(|event| {
            black_box(&event.path);
        });

    let mut tick = 0.0f32;
    c.bench_function("observed_write", |b| {
        b.iter(|| {
            tick += 1.0;
            material.set("diffuseColor", [tick, 0.0, 0.0, 1.0]);
        });
    });
}

fn benchmark_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for len in [1usize, 16, 128] {
        let store = Store::new();
        let lights = Collection::new("lights");
        for i in 0..len {
            let light = Provider::new();
            light.set("intensity", i as f32);
            lights.push_back(light);
        }
        store.add_collection(&lights);
        let path = format!("lights[{}].intensity", len - 1);

        group.bench_with_input(BenchmarkId::from_parameter(len), &path, |b, path| {
            b.iter(|| black_box(store.get::<f32>(black_box(path))));
        });
    }

    group.finish();
}

fn benchmark_attach_detach(c: &mut Criterion) {
    let store = Store::new();
    let provider = Provider::new();
    for i in 0..16 {
        provider.set(&format!("property{i}"), i);
    }
    let _all = store.property_added().connect(|event| {
        black_box(&event.path);
    });

    c.bench_function("attach_detach_16_properties", |b| {
        b.iter(|| {
            store.add_provider(&provider);
            black_box(store.remove_provider(&provider)).ok();
        });
    });
}

criterion_group!(
    benches,
    benchmark_observed_write,
    benchmark_lookup,
    benchmark_attach_detach
);
criterion_main!(benches);
