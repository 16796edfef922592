//! `mcwriter run` command implementation
//!
//! Validates every input table before any request is sent, then verifies
//! the credentials and submits the tables in processing order.

use crate::commands::{input_tables, validate};
use crate::config::Config;
use mcw_writer::report::{write_aliases_csv, write_batches_csv, BATCHES_TABLE, CREATED_LISTS_TABLE};
use mcw_writer::{
    read_chunks, Action, Cleaner, MailchimpApi, MailchimpClient, Result, SubmissionOrchestrator,
    SubmissionReport,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Submit every table in order, feeding created list ids to later tables
pub async fn submit_tables<A>(
    api: &A,
    cleaner: &Cleaner,
    tables: &[(Action, PathBuf)],
    config: &Config,
) -> Result<SubmissionReport>
where
    A: MailchimpApi + ?Sized,
{
    let mut total = SubmissionReport::default();

    for (action, path) in tables {
        info!(table = %action.table_name(), "Processing table");
        let aliases = total.created.clone();
        let lookup = match action {
            Action::CreateLists => None,
            _ => Some(&aliases),
        };

        let chunks = read_chunks(path, action.kind(), config.chunk_size, cleaner, lookup)?;
        let report = SubmissionOrchestrator::new(api, config.submission.clone())
            .submit(*action, chunks)
            .await?;
        total.merge(report);
    }

    Ok(total)
}

/// Run the writer against the data directory
pub async fn run(config: &Config) -> Result<()> {
    let api_key = config.api_key()?;
    let cleaner = Cleaner::standard()?;

    let tables = input_tables(&config.input_dir());
    if tables.is_empty() {
        warn!(dir = %config.input_dir().display(), "No input tables found");
    }
    let summaries = validate::check_tables(&cleaner, &tables, config.chunk_size)?;
    info!(
        tables = summaries.len(),
        records = summaries.iter().map(|s| s.records).sum::<usize>(),
        "Input validated"
    );

    let client = match &config.api_url {
        Some(url) => MailchimpClient::with_base_url(api_key, url.as_str())?,
        None => MailchimpClient::new(api_key)?,
    };
    client.verify_credentials().await?;

    let report = submit_tables(&client, &cleaner, &tables, config).await?;

    let output_dir = config.output_dir();
    write_batches_csv(&output_dir.join(BATCHES_TABLE), &report.completed)?;
    write_aliases_csv(&output_dir.join(CREATED_LISTS_TABLE), &report.created)?;

    println!(
        "Done: {} requests sent, {} batches completed, {} lists created",
        report.serial_requests,
        report.completed.len(),
        report.created.len()
    );
    Ok(())
}
