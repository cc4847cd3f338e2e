use criterion::{Criterion, black_box, criterion_group, criterion_main};
use frame_scan::LuminanceGrid;
use frame_scan::tools::render_code128;
use frame_scan::utils::binarization::{adaptive_binarize, otsu_binarize, threshold_binarize};

fn symbol_grid(width: usize, height: usize) -> LuminanceGrid {
    render_code128("BENCH-0001", width, height, 3, height / 4)
        .unwrap_or_else(|| LuminanceGrid::filled(width, height, 128))
}

fn bench_otsu_binarize_small(c: &mut Criterion) {
    let gray = LuminanceGrid::filled(100, 100, 128);
    c.bench_function("otsu_binarize_100x100", |b| {
        b.iter(|| otsu_binarize(black_box(&gray)))
    });
}

fn bench_otsu_binarize_medium(c: &mut Criterion) {
    let gray = symbol_grid(640, 480);
    c.bench_function("otsu_binarize_640x480", |b| {
        b.iter(|| otsu_binarize(black_box(&gray)))
    });
}

fn bench_otsu_binarize_large(c: &mut Criterion) {
    let gray = symbol_grid(1920, 1080);
    c.bench_function("otsu_binarize_1920x1080", |b| {
        b.iter(|| otsu_binarize(black_box(&gray)))
    });
}

fn bench_adaptive_binarize_medium(c: &mut Criterion) {
    let gray = symbol_grid(640, 480);
    c.bench_function("adaptive_binarize_640x480", |b| {
        b.iter(|| adaptive_binarize(black_box(&gray), black_box(8)))
    });
}

fn bench_threshold_binarize_medium(c: &mut Criterion) {
    let gray = symbol_grid(640, 480);
    c.bench_function("threshold_binarize_640x480", |b| {
        b.iter(|| threshold_binarize(black_box(&gray), black_box(128)))
    });
}

criterion_group!(
    benches,
    bench_otsu_binarize_small,
    bench_otsu_binarize_medium,
    bench_otsu_binarize_large,
    bench_adaptive_binarize_medium,
    bench_threshold_binarize_medium
);
criterion_main!(benches);
