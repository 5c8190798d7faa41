use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use csv_insight::config::AnalysisConfig;
use csv_insight::ingest::IngestOptions;
use csv_insight::io_utils::Decoding;
use csv_insight::pipeline::{self, AnalysisRequest};
use csv_insight::session::Session;
use tempfile::TempDir;

const REGIONS: [&str; 6] = ["North", "South", "East", "West", "Central", "Coastal"];

fn generate_enrollments(years: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("enrollments.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "Year,Region,Enrollments,Centres").expect("header");
    // Newest first so registration has to sort.
    for year in (0..years).rev() {
        for (idx, region) in REGIONS.iter().enumerate() {
            let enrollments = 1_000 + year * 37 + idx * 211;
            let centres = 10 + (year + idx) % 17;
            writeln!(file, "{},{region},{enrollments},{centres}", 1900 + year).expect("row");
        }
    }
    (temp_dir, csv_path)
}

fn options() -> IngestOptions {
    IngestOptions {
        delimiter: b',',
        decoding: Decoding::Lenient,
    }
}

fn bench_pipeline(c: &mut Criterion) {
    let (_dir, csv_path) = generate_enrollments(120);

    c.bench_function("load_and_register", |b| {
        b.iter(|| {
            let mut session = Session::new(AnalysisConfig::default());
            session.load_file(&csv_path, options()).expect("load")
        })
    });

    let mut session = Session::new(AnalysisConfig::default());
    let id = session.load_file(&csv_path, options()).expect("load");
    let request = AnalysisRequest::default();
    c.bench_function("analyze", |b| {
        b.iter_batched(
            || session.get(&id).expect("registered"),
            |(dataset, schema)| pipeline::analyze(dataset, schema, &request, session.config()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
