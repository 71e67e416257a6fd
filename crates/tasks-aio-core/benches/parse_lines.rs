#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tasks_aio_core::TaskParser;

fn build_document(lines: usize) -> String {
    (0..lines)
        .map(|idx| match idx % 4 {
            0 => format!("- [ ] Task {idx} ⏫ 09:00-10:00 📅 2024-01-15 #work"),
            1 => format!("- [x] Task {idx} [due:: 2024-02-01] @phone(555-1234)"),
            2 => format!("  - note {idx} [[2024-03-01]]"),
            _ => format!("Paragraph line {idx} without list syntax"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_document_benchmark(c: &mut Criterion) {
    let parser = TaskParser::new();
    let mut group = c.benchmark_group("parse_document");
    for &lines in &[16usize, 256, 4096] {
        let content = build_document(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &content, |b, content| {
            b.iter(|| black_box(parser.parse_document("Bench.md", content)));
        });
    }
    group.finish();
}

criterion_group!(benches, parse_document_benchmark);
criterion_main!(benches);
