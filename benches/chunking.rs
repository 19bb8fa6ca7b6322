use criterion::{Criterion, criterion_group, criterion_main};
use pdf_qa::chunking::{ChunkingConfig, split_text};
use pdf_qa::index::{IndexEntry, VectorIndex};
use std::hint::black_box;

fn synthetic_document(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Section {i}. The quick brown fox jumps over the lazy dog. \
                 Pack my box with five dozen liquor jugs. How vexingly quick daft zebras jump!\n\
                 Sphinx of black quartz, judge my vow."
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = synthetic_document(2_000);
    let config = ChunkingConfig::default();
    c.bench_function("split_text", |b| {
        b.iter(|| split_text(black_box(&text), black_box(&config)))
    });

    let entries: Vec<IndexEntry> = (0..5_000)
        .map(|i| IndexEntry {
            vector: (0..768).map(|d| ((i * 31 + d * 7) % 101) as f32 / 101.0).collect(),
            text: format!("chunk {i}"),
        })
        .collect();
    let index = VectorIndex::build(entries).expect("entries share a dimension");
    let query: Vec<f32> = (0..768).map(|d| (d % 13) as f32 / 13.0).collect();
    c.bench_function("query_top4", |b| {
        b.iter(|| index.query(black_box(&query), black_box(4)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
