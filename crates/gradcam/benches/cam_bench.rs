//! Benchmarks for saliency map post-processing and rendering.
//!
//! Run with: cargo bench --bench cam_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array2, Array3};

use gradcam_explain::normalize_shifted_max;
use gradcam_vision::{overlay, resize_bilinear};

/// Deterministic coarse map, like a target layer's weighted activations.
fn coarse_map(size: usize) -> Array2<f32> {
    Array2::from_shape_fn((size, size), |(y, x)| ((y * 31 + x * 17) % 23) as f32 / 23.0)
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize_bilinear");

    // At 224x224: 7x7 for ResNet-50 and DenseNet-121, 14x14 for VGG-19 "35", 28x28 for earlier targets
    for size in [7usize, 14, 28] {
        let map = coarse_map(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &map, |b, map| {
            b.iter(|| normalize_shifted_max(resize_bilinear(black_box(map), 224, 224)))
        });
    }

    group.finish();
}

fn bench_overlay(c: &mut Criterion) {
    let image = Array3::from_shape_fn((224, 224, 3), |(y, x, c)| ((y + x + c) % 256) as f32 / 255.0);
    let mask = normalize_shifted_max(resize_bilinear(&coarse_map(7), 224, 224));

    c.bench_function("overlay_224", |b| {
        b.iter(|| overlay(black_box(&image), black_box(&mask)))
    });
}

criterion_group!(benches, bench_resize, bench_overlay);
criterion_main!(benches);
