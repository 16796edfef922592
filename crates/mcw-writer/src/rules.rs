//! Field rule tables per record kind
//!
//! The tables are plain data consumed by the generic [`Cleaner`](crate::clean::Cleaner).
//! They are built once with [`RuleBook::standard`] and passed around explicitly.
//!
//! Column names use [`NESTING_DELIMITER`] to mark one level of nesting, so
//! `contact__city` ends up as `{"contact": {"city": ...}}` in the request body.

use crate::error::{Result, WriterError};
use regex::Regex;
use std::collections::BTreeMap;

/// Delimiter that marks one level of nesting in column names
pub const NESTING_DELIMITER: &str = "__";

/// Vocabulary shared by member `status` and `status_if_new`
pub const MEMBER_STATUSES: &[&str] = &[
    "subscribed",
    "unsubscribed",
    "cleaned",
    "pending",
    "transactional",
];

/// Merge field types accepted by the API
pub const MERGE_FIELD_TYPES: &[&str] = &[
    "text", "number", "address", "phone", "date", "url", "imageurl", "radio", "dropdown",
    "birthday", "zip",
];

/// Separator for list-valued tag options such as `options__choices`
pub const OPTION_LIST_SEPARATOR: char = ',';

/// Kind of record an input table holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    List,
    Member,
    Tag,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::List => "list",
            RecordKind::Member => "member",
            RecordKind::Tag => "tag",
        }
    }

    /// Column holding a local list alias that must be resolved to `list_id`
    pub fn alias_key(&self) -> &'static str {
        match self {
            RecordKind::List => "custom_id",
            RecordKind::Member | RecordKind::Tag => "custom_list_id",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field restricted to a fixed set of values
#[derive(Debug, Clone)]
pub struct EnumField {
    pub name: String,
    pub allowed: Vec<String>,
    pub mandatory: bool,
}

impl EnumField {
    fn new(name: &str, allowed: &[&str], mandatory: bool) -> Self {
        Self {
            name: name.to_string(),
            allowed: names(allowed),
            mandatory,
        }
    }
}

/// Target type of one typed family member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Str,
    Integer,
    List,
}

/// How matched family keys are cleaned
#[derive(Debug, Clone)]
pub enum FamilyTarget {
    OptionalBool,
    OptionalStr,
    /// Each allowed suffix has its own type
    Typed(BTreeMap<String, OptionType>),
}

/// A dynamically discovered group of columns sharing a prefix
///
/// Every key starting with `prefix` must match `pattern`.
#[derive(Debug, Clone)]
pub struct FieldFamily {
    pub prefix: String,
    pub pattern: Regex,
    /// Human-readable form of the pattern used in error messages
    pub expected: String,
    pub target: FamilyTarget,
}

impl FieldFamily {
    pub fn new(prefix: &str, pattern: &str, expected: &str, target: FamilyTarget) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            WriterError::config(format!("Invalid pattern for '{}' columns: {}", prefix, e))
        })?;
        Ok(Self {
            prefix: prefix.to_string(),
            pattern,
            expected: expected.to_string(),
            target,
        })
    }

    /// Part of the key after `prefix` and the nesting delimiter
    pub fn suffix<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.prefix.as_str())?
            .strip_prefix(NESTING_DELIMITER)
    }
}

/// Rules for one record kind
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    pub mandatory_str: Vec<String>,
    pub optional_str: Vec<String>,
    pub mandatory_bool: Vec<String>,
    pub optional_bool: Vec<String>,
    pub enums: Vec<EnumField>,
    /// Sets of fields that must not all be present in one record
    pub exclusive: Vec<Vec<String>>,
    pub families: Vec<FieldFamily>,
    /// Attach `subscriber_hash` computed from `email_address`
    pub derive_subscriber_hash: bool,
}

impl FieldRules {
    /// Every mandatory field name, in table order
    pub fn mandatory_fields(&self) -> Vec<&str> {
        self.mandatory_bool
            .iter()
            .chain(self.mandatory_str.iter())
            .map(String::as_str)
            .chain(
                self.enums
                    .iter()
                    .filter(|e| e.mandatory)
                    .map(|e| e.name.as_str()),
            )
            .collect()
    }
}

/// Rule tables for all record kinds
#[derive(Debug, Clone)]
pub struct RuleBook {
    lists: FieldRules,
    members: FieldRules,
    tags: FieldRules,
}

impl RuleBook {
    /// The tables matching the Mailchimp 3.0 list, member, and merge-field schemas
    pub fn standard() -> Result<Self> {
        Ok(Self {
            lists: list_rules(),
            members: member_rules()?,
            tags: tag_rules()?,
        })
    }

    pub fn rules(&self, kind: RecordKind) -> &FieldRules {
        match kind {
            RecordKind::List => &self.lists,
            RecordKind::Member => &self.members,
            RecordKind::Tag => &self.tags,
        }
    }
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn list_rules() -> FieldRules {
    FieldRules {
        mandatory_str: names(&[
            "name",
            "contact__company",
            "contact__address1",
            "contact__city",
            "contact__state",
            "contact__zip",
            "contact__country",
            "permission_reminder",
            "campaign_defaults__from_name",
            "campaign_defaults__from_email",
            "campaign_defaults__subject",
            "campaign_defaults__language",
        ]),
        optional_str: names(&[
            "contact__address2",
            "contact__phone",
            "notify_on_subscribe",
            "notify_on_unsubscribe",
            "custom_id",
            "list_id",
        ]),
        mandatory_bool: names(&["email_type_option"]),
        optional_bool: names(&["use_archive_bar"]),
        enums: vec![EnumField::new("visibility", &["pub", "prv"], false)],
        exclusive: vec![names(&["custom_id", "list_id"])],
        families: Vec::new(),
        derive_subscriber_hash: false,
    }
}

fn member_rules() -> Result<FieldRules> {
    Ok(FieldRules {
        mandatory_str: names(&["email_address", "list_id"]),
        optional_str: names(&["language", "custom_list_id"]),
        mandatory_bool: Vec::new(),
        optional_bool: names(&["vip", "email_type"]),
        enums: vec![
            EnumField::new("status", MEMBER_STATUSES, true),
            EnumField::new("status_if_new", MEMBER_STATUSES, true),
        ],
        exclusive: vec![names(&["custom_list_id", "list_id"])],
        families: vec![
            FieldFamily::new(
                "interests",
                r"^interests__[0-9a-zA-Z]+$",
                "interests__[0-9a-zA-Z]+",
                FamilyTarget::OptionalBool,
            )?,
            FieldFamily::new(
                "merge_fields",
                r"^merge_fields__(\*\|\w+\|\*|\w+)$",
                "merge_fields__*|<TAG>|* or merge_fields__<TAG>",
                FamilyTarget::OptionalStr,
            )?,
        ],
        derive_subscriber_hash: true,
    })
}

fn tag_rules() -> Result<FieldRules> {
    let options: BTreeMap<String, OptionType> = [
        ("size", OptionType::Integer),
        ("default_country", OptionType::Integer),
        ("phone_format", OptionType::Str),
        ("date_format", OptionType::Str),
        ("choices", OptionType::List),
    ]
    .into_iter()
    .map(|(suffix, kind)| (suffix.to_string(), kind))
    .collect();

    let vocabulary = options.keys().cloned().collect::<Vec<_>>().join("|");
    let pattern = format!("^options__({})$", vocabulary);
    let expected = format!("options__<{}>", vocabulary);

    Ok(FieldRules {
        mandatory_str: names(&["name", "list_id"]),
        optional_str: names(&["tag", "default_value", "help_text", "custom_list_id"]),
        mandatory_bool: Vec::new(),
        optional_bool: names(&["required", "public"]),
        enums: vec![EnumField::new("type", MERGE_FIELD_TYPES, true)],
        exclusive: vec![names(&["custom_list_id", "list_id"])],
        families: vec![FieldFamily::new(
            "options",
            &pattern,
            &expected,
            FamilyTarget::Typed(options),
        )?],
        derive_subscriber_hash: false,
    })
}
