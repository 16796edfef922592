//! Flat-to-nested record conversion
//!
//! Keys containing the delimiter are split once at its first occurrence:
//! `contact__city` becomes `{"contact": {"city": ...}}`. Anything after the
//! first delimiter stays in the inner key untouched, so
//! `merge_fields__*|FNAME|*` nests as `{"merge_fields": {"*|FNAME|*": ...}}`.

use crate::error::{Result, WriterError};
use crate::record::{describe, Record};
use serde_json::{Map, Value};

/// Nest delimiter-joined keys one level deep
///
/// Records without any delimiter pass through unchanged. A prefix that appears
/// both as a plain key and as a nesting prefix is rejected.
pub fn serialize(flat: Record, delimiter: &str) -> Result<Record> {
    if delimiter.is_empty() || !flat.keys().any(|k| k.contains(delimiter)) {
        return Ok(flat);
    }

    let mut nested = Record::new();
    for (key, value) in &flat {
        let Some((outer, inner)) = key.split_once(delimiter) else {
            if nested.contains_key(key) {
                return Err(collision(key, &flat));
            }
            nested.insert(key.clone(), value.clone());
            continue;
        };

        let slot = nested
            .entry(outer.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match slot {
            Value::Object(children) => {
                children.insert(inner.to_string(), value.clone());
            },
            _ => return Err(collision(outer, &flat)),
        }
    }
    Ok(nested)
}

fn collision(key: &str, record: &Record) -> WriterError {
    WriterError::invalid_value(
        key,
        "is used both as a plain column and as a nesting prefix",
        describe(record),
    )
}
