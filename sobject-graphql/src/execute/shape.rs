//! Projection of normalized records onto the selection tree.

use serde_json::Map;
use serde_json::Value;

use crate::query::SelectionKind;
use crate::query::TYPENAME;
use crate::query::TypedSelection;
use crate::schema::LeafType;

const MULTIPICKLIST_SEPARATOR: char = ';';

/// Shapes `records` of type `type_name` into the response for `selections`.
///
/// Response keys follow the selection order and honour aliases.
pub(crate) fn records(records: &[Value], type_name: &str, selections: &[TypedSelection]) -> Value {
    Value::Array(
        records
            .iter()
            .map(|record| match record {
                Value::Object(record) => record_value(record, type_name, selections),
                _ => Value::Null,
            })
            .collect(),
    )
}

fn record_value(
    record: &Map<String, Value>,
    type_name: &str,
    selections: &[TypedSelection],
) -> Value {
    let mut shaped = Map::with_capacity(selections.len());
    for selection in selections {
        if !selection.applies_to(type_name) {
            continue;
        }
        let raw = record.get(selection.field_name.as_str());
        let value = match &selection.kind {
            SelectionKind::Typename => Value::String(type_name.to_string()),
            SelectionKind::Leaf(leaf) => leaf_value(raw, *leaf, &selection.selections),
            SelectionKind::ParentLink(target) => match raw {
                Some(Value::Object(parent)) => record_value(parent, target, &selection.selections),
                _ => Value::Null,
            },
            SelectionKind::Union(union) => match raw {
                Some(Value::Object(parent)) => {
                    let member = parent
                        .get(TYPENAME)
                        .and_then(Value::as_str)
                        .or_else(|| union.members.first().map(|member| member.as_str()))
                        .unwrap_or(union.name.as_str());
                    record_value(parent, member, &selection.selections)
                }
                _ => Value::Null,
            },
            SelectionKind::ChildLink(target) => match raw {
                Some(Value::Array(children)) => records(children, target, &selection.selections),
                // no child rows, or a child link the query could not reach
                _ => Value::Array(Vec::new()),
            },
        };
        shaped.insert(selection.response_key.to_string(), value);
    }
    Value::Object(shaped)
}

fn leaf_value(raw: Option<&Value>, leaf: LeafType, selections: &[TypedSelection]) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match (leaf, raw) {
        (LeafType::StringList, Value::String(values)) => Value::Array(
            values
                .split(MULTIPICKLIST_SEPARATOR)
                .filter(|value| !value.is_empty())
                .map(|value| Value::String(value.to_string()))
                .collect(),
        ),
        (LeafType::Address | LeafType::Location, Value::Object(compound))
            if !selections.is_empty() =>
        {
            composite_value(compound, leaf, selections)
        }
        _ => raw.clone(),
    }
}

fn composite_value(
    compound: &Map<String, Value>,
    leaf: LeafType,
    selections: &[TypedSelection],
) -> Value {
    let type_name = leaf
        .composite_type_name()
        .map(|name| name.to_string())
        .unwrap_or_default();

    let mut shaped = Map::with_capacity(selections.len());
    for selection in selections {
        let value = if selection.is_typename() {
            Value::String(type_name.clone())
        } else {
            match compound.get(selection.field_name.as_str()) {
                // sub-fields are strings, coordinates arrive as numbers
                Some(Value::Number(number)) => Value::String(number.to_string()),
                Some(value) => value.clone(),
                None => Value::Null,
            }
        };
        shaped.insert(selection.response_key.to_string(), value);
    }
    Value::Object(shaped)
}
