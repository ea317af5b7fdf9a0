//! csvz command-line tool
//!
//! Packs CSV files into a package and inspects its catalog.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use csvz::{Package, PackageBuilder, PackageOptions};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "csvz")]
#[command(about = "Self-describing multi-table CSV archives")]
struct Args {
    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML file with package options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add every *.csv file of a directory to a package
    Pack {
        /// Directory to read
        #[arg(short, long)]
        dir: PathBuf,

        /// Package to write [default: <dir name>.csvz]
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Replace tables that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Add one CSV file as a table
    Add {
        file: PathBuf,
        csv: PathBuf,

        /// Table name [default: the CSV file name]
        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a table
    Remove { file: PathBuf, name: String },

    /// List tables with their catalog metadata
    Tables {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Show the column catalog of one table
    Columns {
        file: PathBuf,
        name: String,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let options = match &args.config {
        Some(path) => PackageOptions::from_toml_file(path)
            .with_context(|| format!("reading config {:?}", path))?,
        None => PackageOptions::default(),
    };

    match args.command {
        Command::Pack {
            dir,
            file,
            overwrite,
        } => {
            let file = match file {
                Some(f) => f,
                None => default_package_path(&dir)?,
            };
            let package = open(&file, &options)?;
            let names = package.pack_directory(&dir, overwrite)?;
            for name in &names {
                println!("{}", name);
            }
            info!("Packed {} tables into {:?}", names.len(), file);
            package.close()?;
        }
        Command::Add {
            file,
            csv,
            name,
            overwrite,
        } => {
            let package = open(&file, &options)?;
            let entry = package.add_csv_file(&csv, name.as_deref(), overwrite)?;
            println!("{}\t{} rows", entry.name(), fmt_opt(entry.row_count()));
            drop(entry);
            package.close()?;
        }
        Command::Remove { file, name } => {
            let package = open(&file, &options)?;
            let mut entry = package.get_entry(&name)?;
            entry.delete()?;
            println!("removed {}", entry.name());
            drop(entry);
            package.close()?;
        }
        Command::Tables { file, json } => {
            let package = open_existing(&file, &options)?;
            if json {
                let records: Vec<_> = package
                    .entries()
                    .map(|e| {
                        e.table_record()
                            .unwrap_or_else(|| csvz::TableRecord::unknown(e.filename()))
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("conformance: {}", package.detected_conformance());
                println!("{:<24} {:>12} {:>10} {:>8}", "NAME", "BYTES", "ROWS", "COLUMNS");
                for e in package.entries() {
                    println!(
                        "{:<24} {:>12} {:>10} {:>8}",
                        e.name(),
                        fmt_opt(e.length()),
                        fmt_opt(e.row_count()),
                        fmt_opt(e.column_count())
                    );
                }
            }
        }
        Command::Columns { file, name, json } => {
            let package = open_existing(&file, &options)?;
            let entry = package.get_entry(&name)?;
            let columns = entry.column_schema().unwrap_or_default();
            if json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else if columns.is_empty() {
                println!("{}: no column catalog", entry.name());
            } else {
                println!("{:>4} {:<24} {:<10} {:<8}", "ORD", "COLUMN", "TYPE", "NULLABLE");
                for c in &columns {
                    println!(
                        "{:>4} {:<24} {:<10} {:<8}",
                        c.ordinal,
                        c.column_name,
                        c.data_type(),
                        fmt_opt(c.nullable)
                    );
                }
            }
        }
    }

    Ok(())
}

fn open(path: &Path, options: &PackageOptions) -> anyhow::Result<Package> {
    PackageBuilder::new()
        .path(path)
        .options(options.clone())
        .open()
        .with_context(|| format!("opening {:?}", path))
}

fn open_existing(path: &Path, options: &PackageOptions) -> anyhow::Result<Package> {
    if !path.exists() {
        bail!("{:?} does not exist", path);
    }
    open(path, options)
}

fn default_package_path(dir: &Path) -> anyhow::Result<PathBuf> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("reading directory {:?}", dir))?;
    let Some(stem) = dir.file_name() else {
        bail!("cannot derive a package name from {:?}; pass --file", dir);
    };
    let mut name = stem.to_os_string();
    name.push(".csvz");
    Ok(dir.with_file_name(name))
}

fn fmt_opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
