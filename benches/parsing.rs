use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mboxpdf::export::document::render_document;
use mboxpdf::export::naming::derive_header;
use mboxpdf::parser::mbox::MboxScanner;
use mboxpdf::parser::message::parse_message;

fn bench_scan_mbox(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("simple.mbox");

    c.bench_function("scan_simple_mbox", |b| {
        b.iter(|| {
            MboxScanner::open(&fixture_path)
                .unwrap()
                .filter_map(Result::ok)
                .count()
        })
    });
}

fn bench_parse_and_name(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("simple.mbox");
    let records: Vec<_> = MboxScanner::open(&fixture_path)
        .unwrap()
        .filter_map(Result::ok)
        .collect();

    c.bench_function("parse_name_render_simple", |b| {
        b.iter(|| {
            records
                .iter()
                .map(|record| {
                    let msg = parse_message(&record.contents);
                    let header = derive_header(&msg).unwrap();
                    render_document(&header, &msg).len()
                })
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_scan_mbox, bench_parse_and_name);
criterion_main!(benches);
