//! Record representation shared by the cleaning and submission stages

use serde_json::{Map, Value};

/// One input row: field name to JSON value
///
/// A *flat* record may carry delimiter-joined keys (`contact__city`); a
/// *nested* record has those split one level deep. Both use the same type.
pub type Record = Map<String, Value>;

/// True if the key exists and holds something other than null
///
/// Empty CSV cells are read as null, so a null value counts as absent.
pub fn is_present(record: &Record, key: &str) -> bool {
    record.get(key).is_some_and(|v| !v.is_null())
}

/// Render a record for error messages
pub fn describe(record: &Record) -> String {
    Value::Object(record.clone()).to_string()
}
