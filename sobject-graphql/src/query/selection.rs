//! Selection trees read from a GraphQL document.

use std::collections::HashMap;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;

use crate::error::RequestError;

/// One selected field with its nested selections.
///
/// Fragments are already flattened: fields selected inside an inline fragment or a fragment
/// spread appear directly in the parent selection, tagged with the fragment's type condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// The alias if there is one, the field name otherwise.
    pub response_key: Name,
    pub field_name: Name,
    pub type_condition: Option<Name>,
    pub selections: Vec<Selection>,
}

impl Selection {
    pub fn new(field_name: Name) -> Self {
        Self {
            response_key: field_name.clone(),
            field_name,
            type_condition: None,
            selections: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: Name) -> Self {
        self.response_key = alias;
        self
    }

    pub fn with_type_condition(mut self, type_condition: Name) -> Self {
        self.type_condition = Some(type_condition);
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }
}

/// Parses `query` and returns the root selections of the operation to execute.
///
/// The operation is the one named `operation_name`, or the only operation of the document.
/// Only query operations are accepted. Arguments, variables and directives are ignored.
pub fn parse_operation(
    query: &str,
    operation_name: Option<&str>,
) -> Result<Vec<Selection>, RequestError> {
    let document =
        ast::Document::parse(query, "query.graphql").map_err(|invalid| RequestError::Parse {
            message: invalid.errors.to_string(),
        })?;

    let mut operations = Vec::new();
    let mut fragments = HashMap::new();
    for definition in &document.definitions {
        match definition {
            ast::Definition::OperationDefinition(operation) => operations.push(operation),
            ast::Definition::FragmentDefinition(fragment) => {
                fragments.insert(fragment.name.as_str(), fragment);
            }
            _ => {}
        }
    }

    let operation = match operation_name {
        Some(wanted) => operations
            .into_iter()
            .find(|operation| operation.name.as_ref().is_some_and(|name| name.as_str() == wanted))
            .ok_or_else(|| RequestError::UnknownOperation(wanted.to_string()))?,
        None => match operations.as_slice() {
            [] => return Err(RequestError::NoOperation),
            [operation] => *operation,
            _ => return Err(RequestError::AmbiguousOperation),
        },
    };
    if operation.operation_type != ast::OperationType::Query {
        return Err(RequestError::UnsupportedOperation(
            operation.operation_type.name().to_string(),
        ));
    }

    let mut flattener = Flattener {
        fragments,
        visiting: Vec::new(),
    };
    let mut selections = Vec::new();
    flattener.flatten(&operation.selection_set, None, &mut selections)?;
    Ok(selections)
}

struct Flattener<'doc> {
    fragments: HashMap<&'doc str, &'doc Node<ast::FragmentDefinition>>,
    /// Fragment spreads being expanded, innermost last.
    visiting: Vec<&'doc str>,
}

impl<'doc> Flattener<'doc> {
    fn flatten(
        &mut self,
        selection_set: &'doc [ast::Selection],
        type_condition: Option<&Name>,
        out: &mut Vec<Selection>,
    ) -> Result<(), RequestError> {
        for selection in selection_set {
            match selection {
                ast::Selection::Field(field) => {
                    let mut nested = Vec::new();
                    self.flatten(&field.selection_set, None, &mut nested)?;
                    let response_key = field.alias.as_ref().unwrap_or(&field.name);
                    merge(
                        out,
                        Selection {
                            response_key: response_key.clone(),
                            field_name: field.name.clone(),
                            type_condition: type_condition.cloned(),
                            selections: nested,
                        },
                    );
                }
                ast::Selection::InlineFragment(fragment) => {
                    let condition = fragment.type_condition.as_ref().or(type_condition);
                    self.flatten(&fragment.selection_set, condition, out)?;
                }
                ast::Selection::FragmentSpread(spread) => {
                    let name = spread.fragment_name.as_str();
                    let fragment = *self
                        .fragments
                        .get(name)
                        .ok_or_else(|| RequestError::UnknownFragment(name.to_string()))?;
                    if self.visiting.contains(&name) {
                        return Err(RequestError::FragmentCycle(name.to_string()));
                    }

                    self.visiting.push(name);
                    self.flatten(&fragment.selection_set, Some(&fragment.type_condition), out)?;
                    self.visiting.pop();
                }
            }
        }
        Ok(())
    }
}

/// Adds `selection`, merging it into an earlier selection of the same response key and type
/// condition.
fn merge(out: &mut Vec<Selection>, selection: Selection) {
    let existing = out.iter_mut().find(|existing| {
        existing.response_key == selection.response_key
            && existing.type_condition == selection.type_condition
    });
    match existing {
        Some(existing) => {
            for nested in selection.selections {
                merge(&mut existing.selections, nested);
            }
        }
        None => out.push(selection),
    }
}
