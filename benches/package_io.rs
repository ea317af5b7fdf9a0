//! Benchmarks for table writes and reads through a package

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use csvz::codec::{ColumnSchema, DataType, MemorySource, Value};
use csvz::{Compression, PackageBuilder};
use tempfile::TempDir;

fn make_source(rows: usize) -> MemorySource {
    let columns = vec![
        ColumnSchema::new("id", DataType::Int64).primary_key(),
        ColumnSchema::new("name", DataType::String),
        ColumnSchema::new("score", DataType::Double),
    ];
    let data = (0..rows)
        .map(|i| {
            vec![
                Value::Int64(i as i64),
                Value::String(format!("row-{}", i)),
                Value::Double(i as f64 * 0.5),
            ]
        })
        .collect();
    MemorySource::new(columns, data)
}

fn benchmark_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("package_write");

    for compression in [Compression::Stored, Compression::Deflated] {
        for rows in [100, 10_000].iter() {
            let id = format!("{:?}/{}", compression, rows);
            group.bench_with_input(BenchmarkId::from_parameter(id), rows, |b, &rows| {
                let dir = TempDir::new().unwrap();
                let path = dir.path().join("bench.csvz");
                b.iter(|| {
                    let package = PackageBuilder::new()
                        .path(&path)
                        .compression(compression)
                        .create()
                        .unwrap();
                    let mut source = make_source(rows);
                    let written = package
                        .create_entry("data")
                        .unwrap()
                        .write_data(&mut source)
                        .unwrap();
                    black_box(written);
                });
            });
        }
    }

    group.finish();
}

fn benchmark_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("package_read");

    for rows in [100, 10_000].iter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bench.csvz");
        {
            let package = PackageBuilder::new().path(&path).create().unwrap();
            package
                .create_entry("data")
                .unwrap()
                .write_data(&mut make_source(*rows))
                .unwrap();
            package.close().unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            b.iter(|| {
                let package = PackageBuilder::new().path(&path).open().unwrap();
                let mut reader = package.get_entry("data").unwrap().data_reader().unwrap();
                let mut sum = 0i64;
                while reader.read().unwrap() {
                    sum += reader.get_i64(0).unwrap_or(0);
                }
                black_box(sum);
            });
        });
    }

    group.finish();
}

fn benchmark_open(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("many.csvz");
    {
        let package = PackageBuilder::new().path(&path).create().unwrap();
        for i in 0..50 {
            package
                .create_entry(&format!("t{}", i))
                .unwrap()
                .write_data(&mut make_source(10))
                .unwrap();
        }
        package.close().unwrap();
    }

    c.bench_function("package_open_50_tables", |b| {
        b.iter(|| {
            let package = PackageBuilder::new().path(&path).open().unwrap();
            black_box(package.entries().count());
        });
    });
}

criterion_group!(benches, benchmark_write, benchmark_read, benchmark_open);
criterion_main!(benches);
