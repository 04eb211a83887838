//! Validation and repair of board data.
//!
//! Every path that reads board data from storage or a backup goes through
//! this module before the data is trusted.

pub mod raw;
pub mod repair;
pub mod validate;

pub use raw::RawBoardSet;
pub use repair::{repair, repair_with_report, RepairOptions, RepairReport};
pub use validate::{validate, ValidationIssue, ValidationKind, ValidationReport};

use serde_json::Value;

use crate::types::BoardSet;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Result of ingesting persisted data.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub set: BoardSet,
    /// Set when the data failed validation and was repaired.
    pub repair: Option<RepairReport>,
}

/// Parse text that must hold a JSON object.
pub fn parse_object(text: &str) -> Result<Value, IngestError> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Err(IngestError::NotAnObject("null")),
        Value::Bool(_) => Err(IngestError::NotAnObject("a boolean")),
        Value::Number(_) => Err(IngestError::NotAnObject("a number")),
        Value::String(_) => Err(IngestError::NotAnObject("a string")),
        Value::Array(_) => Err(IngestError::NotAnObject("an array")),
    }
}

/// Turn persisted text into a trusted set for `context`.
///
/// Data that decodes and validates is kept as-is (orders normalized), which
/// keeps a legitimately empty board list empty. Anything else that is still
/// a JSON object goes through `repair`. Only text that is not a JSON object
/// is rejected.
pub fn ingest(text: &str, context: &str, options: &RepairOptions) -> Result<Ingested, IngestError> {
    let value = parse_object(text)?;
    ingest_value(value, context, options)
}

pub fn ingest_value(
    value: Value,
    context: &str,
    options: &RepairOptions,
) -> Result<Ingested, IngestError> {
    let raw = match serde_json::from_value::<BoardSet>(value.clone()) {
        Ok(mut set) => {
            set.context = context.to_string();
            if validate(&set).valid {
                set.normalize_orders();
                return Ok(Ingested { set, repair: None });
            }
            RawBoardSet::from(&set)
        }
        Err(_) => {
            let mut raw = RawBoardSet::from_value(&value);
            raw.context = Some(context.to_string());
            raw
        }
    };

    let (set, report) = repair_with_report(&raw, options);
    log::warn!(
        target: "taskboard.integrity",
        "Data for context '{}' failed validation and was repaired: {:?}",
        context,
        report
    );
    Ok(Ingested {
        set,
        repair: Some(report),
    })
}
