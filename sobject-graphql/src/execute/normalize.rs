//! Normalization of raw query results.
//!
//! A query result is `{totalSize, done, records}`. Child subquery results are nested results
//! of the same shape, and every record carries an `attributes` object with its type and URL.

use serde_json::Map;
use serde_json::Value;

use crate::error::TransportError;
use crate::query::TYPENAME;

const ATTRIBUTES: &str = "attributes";
const RECORDS: &str = "records";
const TOTAL_SIZE: &str = "totalSize";

/// The records of a query result.
///
/// Nested results become plain arrays and `attributes` is replaced by `__typename`, taken from
/// `attributes.type`.
pub(crate) fn records(result: Value) -> Result<Vec<Value>, TransportError> {
    let Value::Object(mut result) = result else {
        return Err(TransportError::MalformedResponse {
            reason: "query result is not an object".to_string(),
        });
    };

    match result.remove(RECORDS) {
        Some(Value::Array(records)) => Ok(records.into_iter().map(normalize).collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(TransportError::MalformedResponse {
            reason: "query result records are not an array".to_string(),
        }),
    }
}

fn is_query_result(object: &Map<String, Value>) -> bool {
    object.contains_key(TOTAL_SIZE) && object.contains_key(RECORDS)
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(mut object) if is_query_result(&object) => match object.remove(RECORDS) {
            Some(Value::Array(records)) => {
                Value::Array(records.into_iter().map(normalize).collect())
            }
            _ => Value::Array(Vec::new()),
        },
        Value::Object(object) => Value::Object(normalize_record(object)),
        other => other,
    }
}

fn normalize_record(mut record: Map<String, Value>) -> Map<String, Value> {
    let type_name = record
        .remove(ATTRIBUTES)
        .and_then(|mut attributes| attributes.get_mut("type").map(Value::take))
        .filter(Value::is_string);

    let mut normalized = Map::with_capacity(record.len() + 1);
    if let Some(type_name) = type_name {
        normalized.insert(TYPENAME.to_string(), type_name);
    }
    for (key, value) in record {
        normalized.insert(key, normalize(value));
    }
    normalized
}
