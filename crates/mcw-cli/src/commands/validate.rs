//! `mcwriter validate` command implementation
//!
//! Cleans and serializes every input table without contacting Mailchimp.
//! List aliases defined in `new_lists.csv` stand in for the remote ids.

use crate::commands::input_tables;
use crate::config::Config;
use mcw_writer::{read_chunks, Action, AliasMap, Cleaner, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Records checked in one input table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub action: Action,
    pub records: usize,
}

/// Validate every table and return per-table record counts
///
/// Each record goes through alias resolution, cleaning, serialization and
/// request building, so anything that would fail during a run fails here.
pub fn check_tables(
    cleaner: &Cleaner,
    tables: &[(Action, PathBuf)],
    chunk_size: usize,
) -> Result<Vec<TableSummary>> {
    let mut aliases = AliasMap::new();
    let mut summaries = Vec::with_capacity(tables.len());

    for (action, path) in tables {
        let lookup = match action {
            Action::CreateLists => None,
            _ => Some(&aliases),
        };

        let mut records = 0;
        let mut defined = Vec::new();
        for chunk in read_chunks(path, action.kind(), chunk_size, cleaner, lookup)? {
            for record in chunk? {
                let operation = action.build(record)?;
                defined.extend(operation.alias);
                records += 1;
            }
        }

        aliases.extend(defined.into_iter().map(|alias| (alias.clone(), alias)));
        info!(table = %action.table_name(), records, "Table is valid");
        summaries.push(TableSummary {
            action: *action,
            records,
        });
    }

    Ok(summaries)
}

/// Validate all input tables of the data directory
pub fn run(config: &Config) -> Result<()> {
    let cleaner = Cleaner::standard()?;
    let tables = input_tables(&config.input_dir());
    if tables.is_empty() {
        warn!(dir = %config.input_dir().display(), "No input tables found");
    }

    let summaries = check_tables(&cleaner, &tables, config.chunk_size)?;
    for summary in &summaries {
        println!("{}: {} records valid", summary.action.table_name(), summary.records);
    }
    Ok(())
}
