//! Integration tests for loading archives with missing or damaged catalogs

use csvz::{CatalogKind, CatalogObserver, Conformance, LoadStatus, Package, PackageBuilder};
use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const STATES: &str = "Code,Name\r\nOR,Oregon\r\nWA,Washington\r\n";

/// Write a zip with exactly the given members
fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in members {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn member_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let zip = zip::ZipArchive::new(file).unwrap();
    zip.file_names().map(str::to_string).collect()
}

/// Overwrite the uncompressed size a member declares in the central directory
fn patch_declared_size(path: &Path, member: &str, size: u32) {
    let mut bytes = std::fs::read(path).unwrap();
    let mut patched = false;
    let mut i = 0;
    while i + 46 <= bytes.len() {
        if bytes[i..i + 4] == [0x50, 0x4b, 0x01, 0x02] {
            let name_len = u16::from_le_bytes([bytes[i + 28], bytes[i + 29]]) as usize;
            if bytes.get(i + 46..i + 46 + name_len) == Some(member.as_bytes()) {
                bytes[i + 24..i + 28].copy_from_slice(&size.to_le_bytes());
                patched = true;
            }
        }
        i += 1;
    }
    assert!(patched, "no central directory entry for {}", member);
    std::fs::write(path, bytes).unwrap();
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<(CatalogKind, LoadStatus)>>>);

impl CatalogObserver for Recorder {
    fn catalog_loaded(&self, kind: CatalogKind, status: &LoadStatus) {
        self.0.borrow_mut().push((kind, status.clone()));
    }
}

#[test]
fn test_plain_zip_without_catalog() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.zip");
    write_zip(&path, &[("states.csv", STATES), ("readme.txt", "hello")]);

    let package = Package::open(&path).unwrap();
    assert_eq!(package.catalog_status().tables, LoadStatus::Absent);
    assert_eq!(package.catalog_status().columns, LoadStatus::Absent);
    assert_eq!(package.detected_conformance(), Conformance::BASIC);

    // Metadata is unknown, not zero
    let entry = package.get_entry("states").unwrap();
    assert_eq!(entry.row_count(), None);
    assert_eq!(entry.length(), None);
    assert!(entry.column_schema().is_none());

    // Raw data still reads, every column as string
    let mut reader = entry.data_reader().unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.get_str(1), Some("Oregon"));
    assert_eq!(package.table_names(), vec!["states"]);
}

#[test]
fn test_corrupt_tables_catalog_degrades() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            ("_meta/tables.csv", "filename,bytes,rows\r\nstates.csv,lots,2\r\n"),
            (
                "_meta/columns.csv",
                "filename,column,ordinal,type\r\nstates.csv,Code,0,string\r\nstates.csv,Name,1,string\r\n",
            ),
        ],
    );

    let recorder = Recorder::default();
    let package = PackageBuilder::new()
        .path(&path)
        .observer(recorder.clone())
        .open()
        .unwrap();

    let events = recorder.0.borrow().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, CatalogKind::Tables);
    assert!(matches!(events[0].1, LoadStatus::Recovered { .. }));
    assert_eq!(events[1].1, LoadStatus::Loaded { rows: 2 });

    let detected = package.detected_conformance();
    assert!(!detected.meta_tables);
    assert!(detected.meta_columns);

    let entries: Vec<_> = package.entries().collect();
    assert_eq!(entries.len(), 1);
    for entry in &entries {
        assert_eq!(entry.length(), None);
        assert_eq!(entry.row_count(), None);
        assert_eq!(entry.column_count(), None);
    }

    let entry = package.get_entry("states").unwrap();
    assert_eq!(entry.column_schema().unwrap().len(), 2);
    assert!(entry.data_reader().is_ok());
}

#[test]
fn test_catalog_missing_key_column_is_recovered() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nokey.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            ("_meta/tables.csv", "bytes,rows\r\n10,2\r\n"),
        ],
    );

    let package = Package::open(&path).unwrap();
    assert!(matches!(
        package.catalog_status().tables,
        LoadStatus::Recovered { .. }
    ));
    assert_eq!(package.catalog_status().columns, LoadStatus::Absent);
}

#[test]
fn test_extra_catalog_columns_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("extra.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            (
                "_meta/tables.csv",
                "filename,rows,checksum\r\nSTATES.CSV,2,abc123\r\n",
            ),
        ],
    );

    let package = Package::open(&path).unwrap();
    assert_eq!(package.catalog_status().tables, LoadStatus::Loaded { rows: 1 });

    let entry = package.get_entry("states").unwrap();
    assert_eq!(entry.row_count(), Some(2));
    assert_eq!(entry.length(), None);
}

#[test]
fn test_rows_for_missing_members_are_dropped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orphans.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            (
                "_meta/tables.csv",
                "filename,rows\r\nstates.csv,2\r\nghost.csv,9\r\n",
            ),
        ],
    );

    let package = Package::open(&path).unwrap();
    assert!(!package.contains("ghost"));

    // The next catalog write no longer carries the orphan row
    let mut source = csvz::codec::CsvRecordReader::new("x\r\n1\r\n".as_bytes()).unwrap();
    package
        .create_entry("more")
        .unwrap()
        .write_data(&mut source)
        .unwrap();
    package.close().unwrap();

    let file = std::fs::File::open(&path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut tables = String::new();
    std::io::Read::read_to_string(&mut zip.by_name("_meta/tables.csv").unwrap(), &mut tables)
        .unwrap();
    assert!(!tables.contains("ghost"));
    assert!(tables.contains("states.csv"));
}

#[test]
fn test_write_repairs_corrupt_catalog() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repair.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            ("_meta/tables.csv", "\"unterminated\r\n"),
        ],
    );

    {
        let package = Package::open(&path).unwrap();
        assert!(!package.catalog_status().tables.is_loaded());
        let mut source = csvz::codec::CsvRecordReader::new("x\r\n1\r\n".as_bytes()).unwrap();
        package
            .create_entry("fresh")
            .unwrap()
            .write_data(&mut source)
            .unwrap();
        package.close().unwrap();
    }

    let package = Package::open(&path).unwrap();
    assert!(package.catalog_status().tables.is_loaded());
    assert_eq!(package.get_entry("fresh").unwrap().row_count(), Some(1));
    // The pre-existing table survives with unknown metadata
    assert_eq!(package.get_entry("states").unwrap().row_count(), None);
}

#[test]
fn test_huge_declared_catalog_size_opens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("huge.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            ("_meta/tables.csv", "filename,rows\r\nstates.csv,2\r\n"),
        ],
    );
    patch_declared_size(&path, "_meta/tables.csv", 0xFFFF_FFF0);

    let package = Package::open(&path).unwrap();
    assert_eq!(package.table_names(), vec!["states"]);
    let mut reader = package.get_entry("states").unwrap().data_reader().unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.get_str(0), Some("OR"));
}

#[test]
fn test_other_meta_members_survive_rewrites() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("relations.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            ("_meta/relations.csv", "parent,child\r\nstates.csv,cities.csv\r\n"),
        ],
    );

    {
        let package = Package::open(&path).unwrap();
        let mut source = csvz::codec::CsvRecordReader::new("x\r\n1\r\n".as_bytes()).unwrap();
        package
            .create_entry("more")
            .unwrap()
            .write_data(&mut source)
            .unwrap();
        assert!(member_names(&path).contains(&"_meta/relations.csv".to_string()));

        package.get_entry("states").unwrap().delete().unwrap();
        package.close().unwrap();
    }

    let mut names = member_names(&path);
    names.sort();
    assert_eq!(
        names,
        vec![
            "_meta/columns.csv",
            "_meta/relations.csv",
            "_meta/tables.csv",
            "more.csv"
        ]
    );
}

#[test]
fn test_catalog_path_matches_any_case() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("upper.csvz");
    write_zip(
        &path,
        &[
            ("states.csv", STATES),
            ("_META/Tables.csv", "filename,rows\r\nstates.csv,2\r\n"),
        ],
    );

    {
        let package = Package::open(&path).unwrap();
        assert_eq!(package.catalog_status().tables, LoadStatus::Loaded { rows: 1 });
        assert_eq!(package.get_entry("states").unwrap().row_count(), Some(2));

        let mut source = csvz::codec::CsvRecordReader::new("x\r\n1\r\n".as_bytes()).unwrap();
        package
            .create_entry("more")
            .unwrap()
            .write_data(&mut source)
            .unwrap();
        package.close().unwrap();
    }

    // The foreign spelling is replaced by the canonical member, not duplicated
    let names = member_names(&path);
    assert!(!names.contains(&"_META/Tables.csv".to_string()));
    assert!(names.contains(&"_meta/tables.csv".to_string()));

    let package = Package::open(&path).unwrap();
    assert_eq!(package.get_entry("states").unwrap().row_count(), Some(2));
    assert_eq!(package.get_entry("more").unwrap().row_count(), Some(1));
}
