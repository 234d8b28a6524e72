//! Benchmarks for hydrology algorithms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use digitalrivers_algorithms::hydrology::{
    fill_depressions, flow_accumulation, flow_direction, resolve_flats, FlowConfig,
};
use digitalrivers_core::{CellSize, Raster};

/// Create a DEM with a basin shape: higher edges sloping toward center outlet
fn create_basin_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size).with_cell_size(CellSize::square(30.0).unwrap());
    let center = size as f64 / 2.0;
    for row in 0..size {
        for col in 0..size {
            let dx = col as f64 - center;
            let dy = row as f64 - center;
            let dist = (dx * dx + dy * dy).sqrt();
            // Bowl shape + small noise to avoid flat areas
            let noise = ((row * 7 + col * 13) % 17) as f64 * 0.01;
            dem.set(row, col, dist + noise).unwrap();
        }
    }
    dem
}

/// Terraced plateau: wide flats that the resolver has to grade
fn create_terraced_dem(size: usize) -> Raster<f64> {
    let mut dem = create_basin_dem(size);
    dem.data_mut().mapv_inplace(|z| (z / 8.0).floor());
    dem
}

fn bench_fill_depressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/fill_depressions");
    for size in [128, 256, 512, 1024] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| fill_depressions(black_box(&dem), 0.0).unwrap())
        });
    }
    group.finish();
}

fn bench_resolve_flats(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/resolve_flats");
    let config = FlowConfig::default();
    for size in [128, 256, 512, 1024] {
        let dem = create_terraced_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| resolve_flats(black_box(&dem), &config).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_direction(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_direction");
    let config = FlowConfig::default();
    for size in [256, 512, 1024, 2048] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_direction(black_box(&dem), &config).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024, 2048] {
        let dem = create_basin_dem(size);
        let fdir = flow_direction(&dem, &FlowConfig::default()).unwrap().directions;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&fdir), None).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_fill_depressions,
    bench_resolve_flats,
    bench_flow_direction,
    bench_flow_accumulation,
);
criterion_main!(benches);
