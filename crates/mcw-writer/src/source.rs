//! Lazy chunked reading of input tables
//!
//! [`ChunkedRecordSource`] pulls rows from a CSV reader one at a time,
//! resolves local list aliases, cleans and serializes each row, and yields
//! them in chunks of at most `chunk_size` records. The sequence is forward
//! only and stops for good after the first error.

use crate::clean::Cleaner;
use crate::error::{Result, WriterError};
use crate::record::{describe, is_present, Record};
use crate::rules::{RecordKind, NESTING_DELIMITER};
use crate::serialize::serialize;
use csv::{StringRecord, StringRecordsIntoIter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Local list alias (`custom_id`) to remote list id
pub type AliasMap = BTreeMap<String, String>;

/// Key the resolved remote list id is stored under
pub const LIST_ID_KEY: &str = "list_id";

/// Pull-based source of cleaned, nested record chunks
pub struct ChunkedRecordSource<'a, R: Read> {
    rows: StringRecordsIntoIter<R>,
    headers: Vec<String>,
    kind: RecordKind,
    chunk_size: usize,
    cleaner: &'a Cleaner,
    aliases: Option<&'a AliasMap>,
    rows_read: usize,
    exhausted: bool,
}

/// Open `path` and read it lazily in chunks of `chunk_size` records
pub fn read_chunks<'a>(
    path: &Path,
    kind: RecordKind,
    chunk_size: usize,
    cleaner: &'a Cleaner,
    aliases: Option<&'a AliasMap>,
) -> Result<ChunkedRecordSource<'a, File>> {
    let file = File::open(path)?;
    debug!(path = %path.display(), kind = %kind, chunk_size, "Opened input table");
    ChunkedRecordSource::from_reader(file, kind, chunk_size, cleaner, aliases)
}

impl<'a, R: Read> ChunkedRecordSource<'a, R> {
    pub fn from_reader(
        reader: R,
        kind: RecordKind,
        chunk_size: usize,
        cleaner: &'a Cleaner,
        aliases: Option<&'a AliasMap>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(WriterError::config("chunk_size must be at least 1"));
        }

        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            rows: reader.into_records(),
            headers,
            kind,
            chunk_size,
            cleaner,
            aliases,
            rows_read: 0,
            exhausted: false,
        })
    }

    /// Number of data rows consumed so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn to_record(&self, row: &StringRecord) -> Record {
        self.headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (header.clone(), value)
            })
            .collect()
    }

    fn prepare(&self, row: &StringRecord) -> Result<Record> {
        let mut record = self.to_record(row);
        if let Some(aliases) = self.aliases {
            resolve_alias(&mut record, self.kind, aliases)?;
        }
        let cleaned = self.cleaner.clean(record, self.kind)?;
        serialize(cleaned, NESTING_DELIMITER)
    }

    fn next_chunk(&mut self) -> Result<Vec<Record>> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            let Some(row) = self.rows.next() else {
                self.exhausted = true;
                break;
            };
            let row = row?;
            self.rows_read += 1;
            chunk.push(self.prepare(&row)?);
        }
        Ok(chunk)
    }
}

impl<R: Read> Iterator for ChunkedRecordSource<'_, R> {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.next_chunk() {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => {
                debug!(kind = %self.kind, records = chunk.len(), rows_read = self.rows_read, "Read chunk");
                Some(Ok(chunk))
            },
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            },
        }
    }
}

/// Replace the kind's alias column with the remote `list_id` it names
///
/// A null alias is dropped. An alias next to an explicit `list_id` is a
/// conflict; an alias missing from `aliases` is an error.
pub fn resolve_alias(record: &mut Record, kind: RecordKind, aliases: &AliasMap) -> Result<()> {
    let column = kind.alias_key();
    let alias = match record.remove(column) {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(alias)) => alias,
        Some(other) => {
            return Err(WriterError::invalid_value(
                column,
                format!("must be a string, not {}", other),
                describe(record),
            ))
        },
    };

    if is_present(record, LIST_ID_KEY) {
        record.insert(column.to_string(), Value::String(alias));
        return Err(WriterError::ConflictingFields {
            fields: vec![column.to_string(), LIST_ID_KEY.to_string()],
            record: describe(record),
        });
    }

    let list_id = aliases.get(&alias).ok_or_else(|| WriterError::UnknownAlias {
        alias: alias.clone(),
        column: column.to_string(),
    })?;
    record.insert(LIST_ID_KEY.to_string(), Value::String(list_id.clone()));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn members_csv(rows: usize) -> String {
        let mut csv = String::from("email_address,list_id,status,status_if_new,vip\n");
        for i in 0..rows {
            csv.push_str(&format!("user{}@example.com,abc123,subscribed,subscribed,true\n", i));
        }
        csv
    }

    fn chunk_sizes(csv: &str, chunk_size: usize) -> Vec<usize> {
        let cleaner = Cleaner::standard().unwrap();
        ChunkedRecordSource::from_reader(
            csv.as_bytes(),
            RecordKind::Member,
            chunk_size,
            &cleaner,
            None,
        )
        .unwrap()
        .map(|chunk| chunk.unwrap().len())
        .collect()
    }

    #[test]
    fn test_chunk_boundaries() {
        assert_eq!(chunk_sizes(&members_csv(7), 3), vec![3, 3, 1]);
        assert_eq!(chunk_sizes(&members_csv(2), 10), vec![2]);
        assert_eq!(chunk_sizes(&members_csv(1), 1), vec![1]);
    }

    #[test]
    fn test_exact_multiple_yields_no_empty_chunk() {
        assert_eq!(chunk_sizes(&members_csv(6), 3), vec![3, 3]);
        assert_eq!(chunk_sizes(&members_csv(0), 3), Vec::<usize>::new());
    }

    #[test]
    fn test_rows_keep_input_order() {
        let cleaner = Cleaner::standard().unwrap();
        let csv = members_csv(5);
        let emails: Vec<String> =
            ChunkedRecordSource::from_reader(csv.as_bytes(), RecordKind::Member, 2, &cleaner, None)
                .unwrap()
                .flat_map(|chunk| chunk.unwrap())
                .map(|r| r["email_address"].as_str().unwrap().to_string())
                .collect();
        let expected: Vec<String> = (0..5).map(|i| format!("user{}@example.com", i)).collect();
        assert_eq!(emails, expected);
    }

    #[test]
    fn test_rows_are_cleaned_and_nested() {
        let cleaner = Cleaner::standard().unwrap();
        let csv = "email_address,list_id,status,status_if_new,vip,merge_fields__FNAME,interests__abc1\n\
                   robin@keboola.com,abc123,subscribed,pending,TRUE,Robin,\n";
        let mut source =
            ChunkedRecordSource::from_reader(csv.as_bytes(), RecordKind::Member, 10, &cleaner, None)
                .unwrap();
        let chunk = source.next().unwrap().unwrap();
        let record = &chunk[0];
        assert_eq!(record["vip"], json!(true));
        assert_eq!(record["merge_fields"], json!({"FNAME": "Robin"}));
        assert_eq!(record["interests"], json!({"abc1": false}));
        assert_eq!(record["subscriber_hash"], json!("a2a362ca5ce6dc7e069b6f7323342079"));
        assert!(source.next().is_none());
        assert_eq!(source.rows_read(), 1);
    }

    #[test]
    fn test_alias_is_resolved_before_cleaning() {
        let cleaner = Cleaner::standard().unwrap();
        let aliases: AliasMap = [("wizards".to_string(), "remote42".to_string())].into();
        let csv = "email_address,custom_list_id,status,status_if_new\n\
                   robin@keboola.com,wizards,subscribed,subscribed\n";
        let chunk = ChunkedRecordSource::from_reader(
            csv.as_bytes(),
            RecordKind::Member,
            10,
            &cleaner,
            Some(&aliases),
        )
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
        assert_eq!(chunk[0]["list_id"], json!("remote42"));
        assert!(!chunk[0].contains_key("custom_list_id"));
    }

    #[test]
    fn test_unknown_alias_fails_and_fuses() {
        let cleaner = Cleaner::standard().unwrap();
        let aliases = AliasMap::new();
        let csv = "email_address,custom_list_id\nrobin@keboola.com,muggles\n";
        let mut source = ChunkedRecordSource::from_reader(
            csv.as_bytes(),
            RecordKind::Member,
            10,
            &cleaner,
            Some(&aliases),
        )
        .unwrap();
        match source.next() {
            Some(Err(WriterError::UnknownAlias { alias, column })) => {
                assert_eq!(alias, "muggles");
                assert_eq!(column, "custom_list_id");
            },
            other => panic!("unexpected {:?}", other.map(|r| r.map(|c| c.len()))),
        }
        assert!(source.next().is_none());
    }

    #[test]
    fn test_resolve_alias_rules() {
        let aliases: AliasMap = [("wizards".to_string(), "remote42".to_string())].into();

        let Value::Object(mut both) = json!({"custom_list_id": "wizards", "list_id": "abc"}) else {
            unreachable!()
        };
        assert!(matches!(
            resolve_alias(&mut both, RecordKind::Tag, &aliases),
            Err(WriterError::ConflictingFields { .. })
        ));

        let Value::Object(mut null_alias) = json!({"custom_list_id": null, "list_id": "abc"})
        else {
            unreachable!()
        };
        resolve_alias(&mut null_alias, RecordKind::Tag, &aliases).unwrap();
        assert_eq!(Value::Object(null_alias), json!({"list_id": "abc"}));

        let Value::Object(mut list) = json!({"custom_id": "wizards", "name": "Wizards"}) else {
            unreachable!()
        };
        resolve_alias(&mut list, RecordKind::List, &aliases).unwrap();
        assert_eq!(list["list_id"], json!("remote42"));
    }

    #[test]
    fn test_cleaning_error_surfaces() {
        let cleaner = Cleaner::standard().unwrap();
        let csv = "email_address,list_id,status,status_if_new,vip\n\
                   robin@keboola.com,abc,subscribed,subscribed,maybe\n";
        let mut source =
            ChunkedRecordSource::from_reader(csv.as_bytes(), RecordKind::Member, 10, &cleaner, None)
                .unwrap();
        assert!(matches!(source.next(), Some(Err(WriterError::InvalidValue { .. }))));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let cleaner = Cleaner::standard().unwrap();
        let csv = members_csv(1);
        let result = ChunkedRecordSource::from_reader(
            csv.as_bytes(),
            RecordKind::Member,
            0,
            &cleaner,
            None,
        );
        assert!(matches!(result, Err(WriterError::Config(_))));
    }
}
