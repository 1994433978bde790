use std::hint::black_box;

use core_model::VisualLineIndex;
use criterion::{Criterion, criterion_group, criterion_main};

const LINES: usize = 1_000_000;

fn wrapped_index() -> VisualLineIndex {
    let mut index = VisualLineIndex::new(LINES);
    for line in (0..LINES).step_by(13) {
        index.update(line, line % 7 + 1);
    }
    index
}

fn bench_lookups(c: &mut Criterion) {
    let index = wrapped_index();
    let total = index.total();
    c.bench_function("visual_offset_1m", |b| {
        let mut line = 0;
        b.iter(|| {
            line = (line + 7919) % LINES;
            black_box(index.visual_offset(black_box(line)))
        })
    });
    c.bench_function("logical_position_1m", |b| {
        let mut row = 0;
        b.iter(|| {
            row = (row + 7919) % total;
            black_box(index.logical_position(black_box(row)))
        })
    });
}

fn bench_edits(c: &mut Criterion) {
    let mut index = wrapped_index();
    c.bench_function("update_1m", |b| {
        let mut line = 0;
        b.iter(|| {
            line = (line + 104_729) % LINES;
            index.update(black_box(line), line % 5 + 1)
        })
    });
    c.bench_function("insert_delete_1m", |b| {
        b.iter(|| {
            index.insert(black_box(LINES / 2), 3, 2);
            index.delete(black_box(LINES / 2), 3);
        })
    });
}

criterion_group!(benches, bench_lookups, bench_edits);
criterion_main!(benches);
