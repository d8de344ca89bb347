use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pregen_grid::{Extent, GridExtent, TILE_OVERLAP, decompose};

fn bench_decompose_box(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose_box");
    for size in [6, 12, 32] {
        let grid = GridExtent::new(-1_000, -1_000, 1_000, 1_000);
        group.bench_function(format!("2001x2001_region_{size}"), |b| {
            b.iter(|| black_box(decompose(black_box(&grid), size, TILE_OVERLAP)))
        });
    }
    group.finish();
}

fn bench_expand_circle(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_circle");
    let grid = Extent::circle(0, 0, 16 * 256).to_grid();
    group.bench_function("radius_256_region_12", |b| {
        b.iter(|| {
            let tiles = decompose(&grid, 12, TILE_OVERLAP);
            let cells: usize = tiles.iter().map(|t| t.cells().len()).sum();
            black_box(cells)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decompose_box, bench_expand_circle);
criterion_main!(benches);
