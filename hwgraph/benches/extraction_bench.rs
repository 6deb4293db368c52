use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hwgraph::parser::sexp::SExpTree;
use hwgraph::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn bench_tokenize(c: &mut Criterion) {
    let content = std::fs::read_to_string(fixture_path("board.kicad_pcb")).unwrap();

    c.bench_function("build_tree_board", |b| {
        b.iter(|| SExpTree::parse(black_box(&content)));
    });
}

fn bench_parse_schematic(c: &mut Criterion) {
    let content = std::fs::read_to_string(fixture_path("divider.kicad_sch")).unwrap();
    let options = ExtractOptions::default();

    c.bench_function("parse_schematic", |b| {
        b.iter(|| HwGraphCore::parse_schematic_str(black_box(&content), "divider.kicad_sch", &options));
    });
}

fn bench_parse_pcb(c: &mut Criterion) {
    let content = std::fs::read_to_string(fixture_path("board.kicad_pcb")).unwrap();
    let options = ExtractOptions {
        pad_adjacency: true,
        ..ExtractOptions::default()
    };

    c.bench_function("parse_pcb", |b| {
        b.iter(|| HwGraphCore::parse_pcb_str(black_box(&content), "board.kicad_pcb", &options));
    });
}

fn bench_projections(c: &mut Criterion) {
    let model = parse_schematic(&fixture_path("divider.kicad_sch")).unwrap();

    c.bench_function("bom", |b| {
        b.iter(|| to_bom(black_box(&model)));
    });
    c.bench_function("mermaid", |b| {
        b.iter(|| to_diagram(black_box(&model)));
    });
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_parse_schematic,
    bench_parse_pcb,
    bench_projections
);
criterion_main!(benches);
