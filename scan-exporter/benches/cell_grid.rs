use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scan_core::pointcloud::scan::Field;
use scan_exporter::{
    cell::{CellGrid, KeyQuantizer},
    component::ComponentDescriptor,
};

fn components() -> Vec<ComponentDescriptor> {
    let position = |field| {
        ComponentDescriptor::discretized(field, 20, 0.001, 0.0, -500.0, 500.0).unwrap()
    };
    vec![
        position(Field::X),
        position(Field::Y),
        position(Field::Z),
        ComponentDescriptor::discretized(Field::Intensity, 8, 1.0 / 255.0, 0.0, 0.0, 1.0).unwrap(),
    ]
}

fn points(count: usize) -> Vec<[f64; 4]> {
    // Deterministic spiral so neighbouring points regularly share cells.
    (0..count)
        .map(|i| {
            let t = i as f64 * 0.001;
            [t.cos() * t, t.sin() * t, t * 0.01, (i % 256) as f64 / 255.0]
        })
        .collect()
}

fn bench_accumulate(c: &mut Criterion) {
    let points = points(100_000);

    c.bench_function("cell_grid_accumulate_finalize", |b| {
        b.iter(|| {
            let mut grid = CellGrid::new(components(), KeyQuantizer::Precision(0.01));
            for p in &points {
                grid.add_point([p[0], p[1], p[2]], p);
            }
            black_box(grid.finalize())
        })
    });
}

criterion_group!(benches, bench_accumulate);
criterion_main!(benches);
