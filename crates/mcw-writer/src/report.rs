//! Output tables for operator inspection

use crate::api::BatchStatus;
use crate::error::Result;
use crate::source::AliasMap;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// File name of the completed batch report
pub const BATCHES_TABLE: &str = "batches.csv";

/// File name of the created list mapping
pub const CREATED_LISTS_TABLE: &str = "created_lists.csv";

#[derive(Debug, Serialize)]
struct BatchRow<'a> {
    id: &'a str,
    status: &'a str,
    total_operations: u64,
    finished_operations: u64,
    errored_operations: u64,
    submitted_at: String,
    completed_at: String,
    response_body_url: &'a str,
}

impl<'a> From<&'a BatchStatus> for BatchRow<'a> {
    fn from(batch: &'a BatchStatus) -> Self {
        Self {
            id: &batch.id,
            status: batch.status.as_str(),
            total_operations: batch.total_operations,
            finished_operations: batch.finished_operations,
            errored_operations: batch.errored_operations,
            submitted_at: batch.submitted_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            completed_at: batch.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            response_body_url: &batch.response_body_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct AliasRow<'a> {
    custom_id: &'a str,
    list_id: &'a str,
}

/// Write one row per completed batch; the header is written even when empty
pub fn write_batches_csv(path: &Path, batches: &[BatchStatus]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record([
        "id",
        "status",
        "total_operations",
        "finished_operations",
        "errored_operations",
        "submitted_at",
        "completed_at",
        "response_body_url",
    ])?;
    for batch in batches {
        writer.serialize(BatchRow::from(batch))?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = batches.len(), "Wrote batch report");
    Ok(())
}

/// Write the `custom_id` to `list_id` mapping of created lists
pub fn write_aliases_csv(path: &Path, aliases: &AliasMap) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(["custom_id", "list_id"])?;
    for (custom_id, list_id) in aliases {
        writer.serialize(AliasRow { custom_id, list_id })?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = aliases.len(), "Wrote created lists");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
