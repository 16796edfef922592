//! Record cleaning and validation
//!
//! [`Cleaner::clean`] applies the [`FieldRules`] of one record kind to a flat
//! record. Steps run in a fixed order and the first violated rule aborts:
//!
//! 1. exclusive field sets
//! 2. mandatory booleans
//! 3. mandatory strings
//! 4. optional strings
//! 5. optional booleans
//! 6. enumerated fields
//! 7. dynamic families (interests, merge fields, tag options)
//! 8. subscriber hash (members only)
//!
//! Boolean-like fields accept `"true"`/`"false"` in any case, native booleans,
//! and null (read as `false`).

use crate::error::{Result, WriterError};
use crate::record::{describe, is_present, Record};
use crate::rules::{
    EnumField, FamilyTarget, FieldFamily, FieldRules, OptionType, RecordKind, RuleBook,
    OPTION_LIST_SEPARATOR,
};
use mcw_common::checksum::subscriber_hash;
use serde_json::Value;
use tracing::trace;

/// Key the derived member hash is stored under
pub const SUBSCRIBER_HASH_KEY: &str = "subscriber_hash";

/// Applies rule tables to records
#[derive(Debug, Clone)]
pub struct Cleaner {
    rules: RuleBook,
}

impl Cleaner {
    pub fn new(rules: RuleBook) -> Self {
        Self { rules }
    }

    /// Cleaner over the standard Mailchimp rule tables
    pub fn standard() -> Result<Self> {
        Ok(Self::new(RuleBook::standard()?))
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Validate and normalize one flat record
    pub fn clean(&self, mut record: Record, kind: RecordKind) -> Result<Record> {
        trace!(kind = %kind, fields = record.len(), "Cleaning record");
        let rules = self.rules.rules(kind);

        check_exclusive(&record, &rules.exclusive)?;
        for field in &rules.mandatory_bool {
            clean_bool(&mut record, field, true)?;
        }
        for field in &rules.mandatory_str {
            check_mandatory_str(&record, field)?;
        }
        for field in &rules.optional_str {
            clean_optional_str(&mut record, field)?;
        }
        for field in &rules.optional_bool {
            clean_bool(&mut record, field, false)?;
        }
        for field in &rules.enums {
            clean_enum(&mut record, field)?;
        }
        for family in &rules.families {
            clean_family(&mut record, family)?;
        }
        attach_subscriber_hash(&mut record, rules)?;

        Ok(record)
    }
}

fn check_exclusive(record: &Record, sets: &[Vec<String>]) -> Result<()> {
    for set in sets {
        if !set.is_empty() && set.iter().all(|field| is_present(record, field)) {
            return Err(WriterError::ConflictingFields {
                fields: set.clone(),
                record: describe(record),
            });
        }
    }
    Ok(())
}

fn check_mandatory_str(record: &Record, field: &str) -> Result<()> {
    match record.get(field) {
        None | Some(Value::Null) => Err(WriterError::missing_field(field, describe(record))),
        Some(Value::String(_)) => Ok(()),
        Some(other) => Err(WriterError::invalid_value(
            field,
            format!("must be a string, not {}", other),
            describe(record),
        )),
    }
}

fn clean_optional_str(record: &mut Record, field: &str) -> Result<()> {
    match record.get(field) {
        None | Some(Value::String(_)) => Ok(()),
        Some(Value::Null) => {
            record.insert(field.to_string(), Value::String(String::new()));
            Ok(())
        },
        Some(other) => Err(WriterError::invalid_value(
            field,
            format!("is optional but must be a string if present, not {}", other),
            describe(record),
        )),
    }
}

/// Coerce a boolean-like field in place
///
/// A missing key is an error only when `mandatory` is set.
fn clean_bool(record: &mut Record, field: &str, mandatory: bool) -> Result<()> {
    let Some(value) = record.get(field) else {
        if mandatory {
            return Err(WriterError::missing_field(field, describe(record)));
        }
        return Ok(());
    };

    let coerced = match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) if s.eq_ignore_ascii_case("true") => true,
        Value::String(s) if s.eq_ignore_ascii_case("false") => false,
        other => {
            return Err(WriterError::invalid_value(
                field,
                format!("can't convert {} to boolean, use 'true' or 'false'", other),
                describe(record),
            ))
        },
    };
    record.insert(field.to_string(), Value::Bool(coerced));
    Ok(())
}

fn clean_enum(record: &mut Record, field: &EnumField) -> Result<()> {
    let value = match record.get(&field.name) {
        None | Some(Value::Null) if field.mandatory => {
            return Err(WriterError::missing_field(&field.name, describe(record)))
        },
        None => return Ok(()),
        Some(Value::Null) => {
            record.remove(&field.name);
            return Ok(());
        },
        Some(value) => value,
    };

    let allowed = value
        .as_str()
        .is_some_and(|v| field.allowed.iter().any(|a| a == v));
    if allowed {
        Ok(())
    } else {
        Err(WriterError::invalid_value(
            &field.name,
            format!("must be one of {:?}, not {}", field.allowed, value),
            describe(record),
        ))
    }
}

fn clean_family(record: &mut Record, family: &FieldFamily) -> Result<()> {
    let keys: Vec<String> = record
        .keys()
        .filter(|key| key.starts_with(family.prefix.as_str()))
        .cloned()
        .collect();

    if let Some(bad) = keys.iter().find(|key| !family.pattern.is_match(key)) {
        return Err(WriterError::invalid_value(
            bad,
            format!(
                "'{}' columns must have format '{}'",
                family.prefix, family.expected
            ),
            describe(record),
        ));
    }

    for key in &keys {
        match &family.target {
            FamilyTarget::OptionalBool => clean_bool(record, key, false)?,
            FamilyTarget::OptionalStr => clean_optional_str(record, key)?,
            FamilyTarget::Typed(types) => {
                let option_type = family
                    .suffix(key)
                    .and_then(|suffix| types.get(suffix))
                    .copied()
                    .ok_or_else(|| {
                        WriterError::invalid_value(
                            key,
                            format!("expected one of '{}'", family.expected),
                            describe(record),
                        )
                    })?;
                clean_typed_option(record, key, option_type)?;
            },
        }
    }
    Ok(())
}

fn clean_typed_option(record: &mut Record, key: &str, option_type: OptionType) -> Result<()> {
    let Some(value) = record.get(key) else {
        return Ok(());
    };

    let coerced = match (option_type, value) {
        (_, Value::Null) => None,
        (OptionType::Str, Value::String(_)) => Some(value.clone()),
        (OptionType::Integer, Value::Number(n)) if n.is_i64() => Some(value.clone()),
        (OptionType::Integer, Value::String(s)) => {
            let parsed = s.trim().parse::<i64>().map_err(|_| {
                WriterError::invalid_value(
                    key,
                    format!("can't convert '{}' to integer", s),
                    describe(record),
                )
            })?;
            Some(Value::from(parsed))
        },
        (OptionType::List, Value::String(s)) => Some(Value::Array(
            s.split(OPTION_LIST_SEPARATOR)
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(|piece| Value::String(piece.to_string()))
                .collect(),
        )),
        (OptionType::List, Value::Array(items)) if items.iter().all(Value::is_string) => {
            Some(value.clone())
        },
        (expected, other) => {
            return Err(WriterError::invalid_value(
                key,
                format!("expected {:?} value, got {}", expected, other),
                describe(record),
            ))
        },
    };

    match coerced {
        Some(value) => record.insert(key.to_string(), value),
        None => record.remove(key),
    };
    Ok(())
}

fn attach_subscriber_hash(record: &mut Record, rules: &FieldRules) -> Result<()> {
    if !rules.derive_subscriber_hash {
        return Ok(());
    }
    let hash = match record.get("email_address") {
        Some(Value::String(email)) => subscriber_hash(email),
        Some(_) => {
            return Err(WriterError::invalid_value(
                "email_address",
                "must be a string",
                describe(record),
            ))
        },
        None => return Err(WriterError::missing_field("email_address", describe(record))),
    };
    record.insert(SUBSCRIBER_HASH_KEY.to_string(), Value::String(hash));
    Ok(())
}
