use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use mdbparse::Database;

/// Inspect Microsoft Access (MDB/ACCDB) database files.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Database file to read
    #[arg(long)]
    file: PathBuf,
    /// List the tables in the catalog
    #[arg(long)]
    catalog: bool,
    /// Dump a single table
    #[arg(long)]
    table: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let db = Database::open(&args.file)
        .with_context(|| format!("failed to open {}", args.file.display()))?;

    if args.catalog {
        for (name, page) in db.catalog() {
            println!("{name}\t(page {page})");
        }
        return Ok(());
    }

    if let Some(name) = &args.table {
        let rows = db
            .parse_table(name)
            .with_context(|| format!("no such table: {name}"))?;
        println!("{}", rows.column_names().collect::<Vec<_>>().join(" | "));
        for row in 0..rows.row_count() {
            let line = rows
                .iter()
                .map(|(_, values)| values[row].to_string())
                .collect::<Vec<_>>()
                .join(" | ");
            println!("{line}");
        }
        return Ok(());
    }

    db.print_database();
    Ok(())
}
