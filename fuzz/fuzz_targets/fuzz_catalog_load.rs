#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::io::Write;
use zip::write::SimpleFileOptions;

#[derive(Arbitrary, Debug)]
struct Input {
    tables: Vec<u8>,
    columns: Vec<u8>,
    data: Vec<u8>,
}

// Arbitrary catalog bytes must never fail an open or panic a read
fuzz_target!(|input: Input| {
    let dir = match tempfile::TempDir::new() {
        Ok(d) => d,
        Err(_) => return,
    };
    let path = dir.path().join("fuzz.csvz");

    {
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let opts = SimpleFileOptions::default();
        zip.start_file("t.csv", opts).unwrap();
        zip.write_all(&input.data).unwrap();
        zip.start_file("_meta/tables.csv", opts).unwrap();
        zip.write_all(&input.tables).unwrap();
        zip.start_file("_meta/columns.csv", opts).unwrap();
        zip.write_all(&input.columns).unwrap();
        zip.finish().unwrap();
    }

    let package = csvz::Package::open(&path).expect("catalog bytes must not fail open");
    for entry in package.entries() {
        let _ = entry.row_count();
        let _ = entry.column_schema();
        if let Ok(mut reader) = entry.data_reader() {
            while let Ok(true) = reader.read() {}
        }
    }
});
