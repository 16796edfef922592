//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod run;
pub mod validate;

use mcw_writer::Action;
use std::path::{Path, PathBuf};
use tracing::info;

/// Input tables present in `input_dir`, in processing order
pub fn input_tables(input_dir: &Path) -> Vec<(Action, PathBuf)> {
    Action::ALL
        .iter()
        .filter_map(|action| {
            let path = input_dir.join(action.table_name());
            if path.is_file() {
                Some((*action, path))
            } else {
                info!(table = %action.table_name(), "Input table not found, skipping");
                None
            }
        })
        .collect()
}
