//! Performance benchmarks for student ID extraction.
//!
//! Extraction runs once per tag read, on the reader loop, while the student
//! is still holding the card. These benchmarks track how scan cost grows
//! with the size of the dump and where the FE00 section sits in it.
//!
//! # Run Benchmarks
//!
//! ```sh
//! # Run all extraction benchmarks
//! cargo bench --bench extract_bench
//!
//! # Run a specific group
//! cargo bench --bench extract_bench -- dump_size
//!
//! # Compare against a saved baseline
//! cargo bench --bench extract_bench -- --save-baseline before
//! cargo bench --bench extract_bench -- --baseline before
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use umbrella_reader::extract_student_id;

const FE00_HEADER: &str = "System FE00 (Common Area)";
const STUDENT_LINE: &str =
    "  0000: 30 31 32 31 31 32 33 34 35 36 37 38 20 20 20 20 |012112345678    |";

/// A dump with `filler_sections` unrelated sections, 16 blocks each, before
/// the FE00 section.
fn card_dump(filler_sections: usize) -> Vec<String> {
    let mut lines = vec![
        "Type3Tag 'FeliCa Standard (RC-S962)' ID=01120312D4A1B2C3 SYS=FE00".to_string(),
    ];
    for section in 0..filler_sections {
        lines.push(format!("System {:04X} (Other)", 0x8000 + section));
        for block in 0..16 {
            lines.push(format!(
                "  {:04X}: 00 11 22 33 44 55 66 77 88 99 AA BB CC DD EE FF |..\"3DUfw........|",
                block
            ));
        }
    }
    lines.push(FE00_HEADER.to_string());
    lines.push(STUDENT_LINE.to_string());
    lines
}

/// Benchmark extraction as the number of sections before FE00 grows.
fn bench_dump_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("dump_size");

    for sections in [0, 4, 16, 64] {
        let dump = card_dump(sections);
        group.throughput(Throughput::Elements(dump.len() as u64));

        group.bench_with_input(BenchmarkId::new("sections", sections), &dump, |b, dump| {
            b.iter(|| black_box(extract_student_id(black_box(dump.as_slice()))));
        });
    }

    group.finish();
}

/// Benchmark the early exits against the happy path.
///
/// Compares:
/// - A readable card (match on the first FE00 data line)
/// - A card without an FE00 section (full scan, no match)
/// - An FE00 section whose data line has no 12-digit run
fn bench_outcomes(c: &mut Criterion) {
    let mut group = c.benchmark_group("outcomes");
    group.throughput(Throughput::Elements(1));

    let readable = card_dump(4);
    let no_section: Vec<String> = card_dump(4)
        .into_iter()
        .filter(|line| line != FE00_HEADER)
        .collect();
    let no_digits: Vec<String> = card_dump(4)
        .into_iter()
        .map(|line| {
            if line == STUDENT_LINE {
                "  0000: 41 42 43 44 45 46 47 48 49 4A 4B 4C 20 20 20 20 |ABCDEFGHIJKL    |"
                    .to_string()
            } else {
                line
            }
        })
        .collect();

    let scenarios = vec![
        ("readable", readable),
        ("no_fe00_section", no_section),
        ("no_digit_run", no_digits),
    ];

    for (name, dump) in scenarios {
        group.bench_function(name, |b| {
            b.iter(|| black_box(extract_student_id(black_box(dump.as_slice()))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dump_size, bench_outcomes);
criterion_main!(benches);
