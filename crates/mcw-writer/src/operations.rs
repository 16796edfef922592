//! Per-action request builders
//!
//! Each input table maps to one [`Action`], which turns a cleaned, nested
//! record into an [`Operation`] addressed at the right resource.

use crate::api::endpoints;
use crate::api::{HttpMethod, Operation};
use crate::error::{Result, WriterError};
use crate::record::{describe, Record};
use crate::rules::RecordKind;
use crate::source::LIST_ID_KEY;
use serde_json::Value;

/// Keys used to address resources that never go into a request body
pub const ROUTING_KEYS: &[&str] = &["list_id", "custom_id", "custom_list_id", "subscriber_hash"];

/// What to do with the records of one input table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateLists,
    UpdateLists,
    AddTags,
    AddMembers,
    UpdateMembers,
    DeleteMembers,
}

impl Action {
    /// All actions in the order a run processes them
    pub const ALL: [Action; 6] = [
        Action::CreateLists,
        Action::UpdateLists,
        Action::AddTags,
        Action::AddMembers,
        Action::UpdateMembers,
        Action::DeleteMembers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateLists => "new_lists",
            Action::UpdateLists => "update_lists",
            Action::AddTags => "add_tags",
            Action::AddMembers => "add_members",
            Action::UpdateMembers => "update_members",
            Action::DeleteMembers => "delete_members",
        }
    }

    /// File name of the input table
    pub fn table_name(&self) -> String {
        format!("{}.csv", self.as_str())
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Action::CreateLists | Action::UpdateLists => RecordKind::List,
            Action::AddTags => RecordKind::Tag,
            Action::AddMembers | Action::UpdateMembers | Action::DeleteMembers => {
                RecordKind::Member
            },
        }
    }

    /// Whether records must be sent one by one regardless of chunk size
    ///
    /// Created list ids are needed for the alias map, and batch results
    /// only come back as an archive.
    pub fn requires_serial(&self) -> bool {
        matches!(self, Action::CreateLists)
    }

    /// Build the operation for one cleaned, nested record
    pub fn build(&self, mut record: Record) -> Result<Operation> {
        let operation = match self {
            Action::CreateLists => {
                let alias = non_empty(&record, "custom_id");
                Operation {
                    method: HttpMethod::Post,
                    path: endpoints::lists_path(),
                    operation_id: required(&record, "name")?,
                    alias,
                    body: None,
                }
            },
            Action::UpdateLists => {
                let list_id = required(&record, LIST_ID_KEY)?;
                Operation {
                    method: HttpMethod::Patch,
                    path: endpoints::list_path(&list_id),
                    operation_id: list_id,
                    alias: None,
                    body: None,
                }
            },
            Action::AddTags => {
                let list_id = required(&record, LIST_ID_KEY)?;
                let operation_id = match non_empty(&record, "tag") {
                    Some(tag) => tag,
                    None => required(&record, "name")?,
                };
                Operation {
                    method: HttpMethod::Post,
                    path: endpoints::merge_fields_path(&list_id),
                    operation_id,
                    alias: None,
                    body: None,
                }
            },
            Action::AddMembers | Action::UpdateMembers | Action::DeleteMembers => {
                let list_id = required(&record, LIST_ID_KEY)?;
                let hash = required(&record, "subscriber_hash")?;
                let method = match self {
                    Action::AddMembers => HttpMethod::Put,
                    Action::UpdateMembers => HttpMethod::Patch,
                    _ => HttpMethod::Delete,
                };
                Operation {
                    method,
                    path: endpoints::member_path(&list_id, &hash),
                    operation_id: required(&record, "email_address")?,
                    alias: None,
                    body: None,
                }
            },
        };

        let body = match self {
            Action::DeleteMembers => None,
            _ => {
                for key in ROUTING_KEYS {
                    record.remove(*key);
                }
                Some(Value::Object(record))
            },
        };
        Ok(Operation { body, ..operation })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(record: &Record, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(record: &Record, key: &str) -> Result<String> {
    non_empty(record, key).ok_or_else(|| WriterError::missing_field(key, describe(record)))
}
