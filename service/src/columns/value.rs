//! Cell sanitising: raw cells to stored values and back

use chrono::NaiveDate;
use serde_json::Value;
use sheetsync_core::types::CellValue;
use thiserror::Error;

use super::descriptor::{ColumnDescriptor, ValueKind};
use super::enums::EnumCodec;

/// Cell content that cannot be stored
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Not a full or truncated ISO-8601 calendar date
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// No bracketed enumeration code
    #[error("Could not parse enumeration value from: {0}")]
    InvalidEnumeration(String),
}

/// Stored value for a cell. Blank cells become `Null`.
///
/// # Errors
///
/// Returns `ValueError` for malformed dates and enumeration cells
pub fn sanitise(column: &ColumnDescriptor, cell: &CellValue) -> Result<Value, ValueError> {
    if let (ValueKind::Date, CellValue::Date(date)) = (column.value_kind, cell) {
        return Ok(Value::String(date.format("%Y-%m-%d").to_string()));
    }
    if let (ValueKind::Boolean, CellValue::Bool(flag)) = (column.value_kind, cell) {
        return Ok(Value::Bool(*flag));
    }

    let Some(text) = cell.as_text() else {
        return Ok(Value::Null);
    };

    match column.value_kind {
        ValueKind::Text => Ok(Value::String(text)),
        ValueKind::Date => {
            if is_iso_date(&text) {
                Ok(Value::String(text))
            } else {
                Err(ValueError::InvalidDate(text))
            }
        }
        ValueKind::Enumeration(_) => Ok(EnumCodec::decode(&text)?.map_or(Value::Null, Value::String)),
        ValueKind::Boolean => Ok(Value::Bool(text == "true")),
    }
}

/// Cell text for a stored value; absent values render blank
#[must_use]
pub fn render(column: &ColumnDescriptor, value: Option<&Value>, codec: &EnumCodec) -> Option<String> {
    let value = match value? {
        Value::Null => return None,
        Value::Array(items) if column.list_valued => items.first()?,
        other => other,
    };
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    if text.is_empty() {
        return None;
    }
    Some(match column.value_kind {
        ValueKind::Enumeration(name) => codec.encode(name, &text),
        _ => text,
    })
}

/// `YYYY`, `YYYY-MM` or `YYYY-MM-DD` naming a real calendar date
#[must_use]
pub fn is_iso_date(text: &str) -> bool {
    let parts: Vec<&str> = text.split('-').collect();
    let digits = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_digit());
    match parts[..] {
        [year] => digits(year, 4),
        [year, month] => {
            digits(year, 4)
                && digits(month, 2)
                && NaiveDate::parse_from_str(&format!("{year}-{month}-01"), "%Y-%m-%d").is_ok()
        }
        [year, month, day] => {
            digits(year, 4)
                && digits(month, 2)
                && digits(day, 2)
                && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        }
        _ => false,
    }
}
