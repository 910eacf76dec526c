//! Selections annotated with the shape of the fields they select.

use std::sync::Arc;

use apollo_compiler::Name;

use super::selection::Selection;
use crate::error::UnknownFieldError;
use crate::schema::FieldKind;
use crate::schema::LeafType;
use crate::schema::ObjectTypeNode;
use crate::schema::SchemaGraph;
use crate::schema::UnionTypeNode;

pub(crate) const TYPENAME: &str = "__typename";

/// The kind of a selected field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionKind {
    /// `__typename`, answered from the type of the enclosing record.
    Typename,
    Leaf(LeafType),
    ParentLink(Name),
    Union(Arc<UnionTypeNode>),
    ChildLink(Name),
}

/// A [`Selection`] resolved against the schema graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedSelection {
    pub response_key: Name,
    pub field_name: Name,
    /// The union member this selection applies to, if it was selected inside a fragment on
    /// that member.
    pub type_condition: Option<Name>,
    pub kind: SelectionKind,
    pub selections: Vec<TypedSelection>,
}

impl TypedSelection {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, SelectionKind::Leaf(_))
    }

    pub fn is_relationship(&self) -> bool {
        matches!(
            self.kind,
            SelectionKind::ParentLink(_) | SelectionKind::Union(_) | SelectionKind::ChildLink(_)
        )
    }

    pub fn is_child_relationship(&self) -> bool {
        matches!(self.kind, SelectionKind::ChildLink(_))
    }

    pub fn is_typename(&self) -> bool {
        matches!(self.kind, SelectionKind::Typename)
    }

    /// Whether this selection applies to a record of type `type_name`.
    pub fn applies_to(&self, type_name: &str) -> bool {
        self.type_condition
            .as_ref()
            .is_none_or(|condition| condition.as_str() == type_name)
    }
}

/// Walks the schema graph alongside a selection tree.
pub(crate) struct Annotator<'a> {
    graph: &'a SchemaGraph,
    path: Vec<String>,
}

impl<'a> Annotator<'a> {
    pub(crate) fn new(graph: &'a SchemaGraph, root_key: &str) -> Self {
        Self {
            graph,
            path: vec![root_key.to_string()],
        }
    }

    /// Annotates selections made on records of `object`.
    pub(crate) fn object(
        &mut self,
        object: &ObjectTypeNode,
        selections: &[Selection],
    ) -> Result<Vec<TypedSelection>, UnknownFieldError> {
        let mut typed = Vec::with_capacity(selections.len());
        for selection in selections {
            // a fragment on another type never matches records of this object
            if selection
                .type_condition
                .as_ref()
                .is_some_and(|condition| *condition != object.name)
            {
                continue;
            }
            self.path.push(selection.response_key.to_string());
            let annotated = self.field(object, selection)?;
            self.path.pop();
            merge(
                &mut typed,
                TypedSelection {
                    type_condition: None,
                    ..annotated
                },
            );
        }
        Ok(typed)
    }

    fn union(
        &mut self,
        union: &UnionTypeNode,
        selections: &[Selection],
    ) -> Result<Vec<TypedSelection>, UnknownFieldError> {
        let graph = self.graph;
        let mut typed = Vec::with_capacity(selections.len());
        for selection in selections {
            self.path.push(selection.response_key.to_string());
            let annotated = match &selection.type_condition {
                Some(condition) if union.members.contains(condition) => {
                    let member = self.lookup(condition.as_str())?;
                    Some(self.field(member, selection)?)
                }
                Some(condition) if *condition != union.name => None,
                _ if selection.field_name.as_str() == TYPENAME => Some(typename(selection)),
                _ => {
                    let field_name = selection.field_name.as_str();
                    let member = union
                        .members
                        .iter()
                        .filter_map(|member| graph.object(member.as_str()))
                        .find(|member| member.field(field_name).is_some())
                        .ok_or_else(|| self.unknown_field(field_name, &union.name))?;
                    // a field missing from some members only applies to the member it came from
                    let shared = union.members.iter().all(|member| {
                        graph
                            .object(member.as_str())
                            .is_some_and(|member| member.field(field_name).is_some())
                    });
                    let annotated = self.field(member, selection)?;
                    Some(TypedSelection {
                        type_condition: (!shared).then(|| member.name.clone()),
                        ..annotated
                    })
                }
            };
            self.path.pop();
            if let Some(annotated) = annotated {
                merge(&mut typed, annotated);
            }
        }
        Ok(typed)
    }

    fn composite(
        &mut self,
        leaf: LeafType,
        selections: &[Selection],
    ) -> Result<Vec<TypedSelection>, UnknownFieldError> {
        let (Some(type_name), Some(fields)) =
            (leaf.composite_type_name(), leaf.composite_fields())
        else {
            // scalars have no sub-fields to select
            return match selections.first() {
                Some(first) => {
                    self.path.push(first.response_key.to_string());
                    Err(self.unknown_field(&first.field_name, leaf.ty().inner_named_type()))
                }
                None => Ok(Vec::new()),
            };
        };
        let fields: Vec<&str> = fields.collect();

        let mut typed = Vec::with_capacity(selections.len());
        for selection in selections {
            self.path.push(selection.response_key.to_string());
            let kind = if selection.field_name.as_str() == TYPENAME {
                SelectionKind::Typename
            } else if fields.contains(&selection.field_name.as_str()) {
                SelectionKind::Leaf(LeafType::String)
            } else {
                return Err(self.unknown_field(&selection.field_name, &type_name));
            };
            self.path.pop();
            merge(
                &mut typed,
                TypedSelection {
                    response_key: selection.response_key.clone(),
                    field_name: selection.field_name.clone(),
                    type_condition: None,
                    kind,
                    selections: Vec::new(),
                },
            );
        }
        Ok(typed)
    }

    /// Annotates one selection made on `object`, recursing into its sub-selections.
    fn field(
        &mut self,
        object: &ObjectTypeNode,
        selection: &Selection,
    ) -> Result<TypedSelection, UnknownFieldError> {
        if selection.field_name.as_str() == TYPENAME {
            return Ok(typename(selection));
        }
        let field = object
            .field(selection.field_name.as_str())
            .ok_or_else(|| self.unknown_field(&selection.field_name, &object.name))?;

        let (kind, selections) = match &field.kind {
            FieldKind::Leaf(leaf) => (
                SelectionKind::Leaf(*leaf),
                self.composite(*leaf, &selection.selections)?,
            ),
            FieldKind::ParentLink(target) => {
                let parent = self.lookup(target)?;
                (
                    SelectionKind::ParentLink(target.clone()),
                    self.object(parent, &selection.selections)?,
                )
            }
            FieldKind::ChildLink(target) => {
                let child = self.lookup(target)?;
                (
                    SelectionKind::ChildLink(target.clone()),
                    self.object(child, &selection.selections)?,
                )
            }
            FieldKind::Union(union) => (
                SelectionKind::Union(union.clone()),
                self.union(union, &selection.selections)?,
            ),
        };

        Ok(TypedSelection {
            response_key: selection.response_key.clone(),
            field_name: selection.field_name.clone(),
            type_condition: selection.type_condition.clone(),
            kind,
            selections,
        })
    }

    fn lookup(&self, object: &str) -> Result<&'a ObjectTypeNode, UnknownFieldError> {
        // links only ever target registered objects
        self.graph
            .object(object)
            .ok_or_else(|| self.unknown_field(object, object))
    }

    fn unknown_field(&self, field: &str, parent_type: &str) -> UnknownFieldError {
        UnknownFieldError {
            field: field.to_string(),
            parent_type: parent_type.to_string(),
            path: self.path.clone(),
        }
    }
}

/// Adds `selection` to `typed`, folding it into an earlier selection that fills the same
/// response key on the same records.
fn merge(typed: &mut Vec<TypedSelection>, selection: TypedSelection) {
    match typed.iter_mut().find(|existing| {
        existing.response_key == selection.response_key
            && existing.type_condition == selection.type_condition
    }) {
        Some(existing) => {
            for nested in selection.selections {
                merge(&mut existing.selections, nested);
            }
        }
        None => typed.push(selection),
    }
}

fn typename(selection: &Selection) -> TypedSelection {
    TypedSelection {
        response_key: selection.response_key.clone(),
        field_name: selection.field_name.clone(),
        type_condition: selection.type_condition.clone(),
        kind: SelectionKind::Typename,
        selections: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::metadata::FieldDescriptor;
    use crate::metadata::ObjectDescriptor;
    use crate::metadata::ScalarKind;
    use crate::schema::SchemaBuilder;

    fn graph() -> SchemaGraph {
        let (graph, _) = SchemaBuilder::new()
            .build(&[
                ObjectDescriptor::new("Case")
                    .with_field(FieldDescriptor::new("Id", ScalarKind::Id))
                    .with_field(FieldDescriptor::new("Subject", ScalarKind::String))
                    .with_field(FieldDescriptor::reference("OwnerId", ["User", "Group"], "Owner")),
                ObjectDescriptor::new("User")
                    .with_field(FieldDescriptor::new("Id", ScalarKind::Id))
                    .with_field(FieldDescriptor::new("Username", ScalarKind::String))
                    .with_field(FieldDescriptor::new("Address", ScalarKind::Address)),
                ObjectDescriptor::new("Group")
                    .with_field(FieldDescriptor::new("Id", ScalarKind::Id))
                    .with_field(FieldDescriptor::new("DeveloperName", ScalarKind::String)),
            ])
            .unwrap();
        graph
    }

    fn annotate(
        graph: &SchemaGraph,
        selection: Selection,
    ) -> Result<Vec<TypedSelection>, UnknownFieldError> {
        let root = graph.object(&selection.field_name).unwrap();
        Annotator::new(graph, &selection.response_key).object(root, &selection.selections)
    }

    #[test]
    fn flags_leaves_and_relationships() {
        let graph = graph();
        let typed = annotate(
            &graph,
            Selection::new(name!("Case"))
                .with_selection(Selection::new(name!("Subject")))
                .with_selection(
                    Selection::new(name!("Owner")).with_selection(Selection::new(name!("Id"))),
                ),
        )
        .unwrap();

        assert!(typed[0].is_leaf());
        assert!(!typed[0].is_relationship());
        assert!(typed[1].is_relationship());
        assert!(!typed[1].is_child_relationship());
        assert!(matches!(&typed[1].kind, SelectionKind::Union(union) if union.name.as_str() == "UnionGroupUser"));
    }

    #[test]
    fn union_fields_resolve_against_the_fragment_member() {
        let graph = graph();
        let typed = annotate(
            &graph,
            Selection::new(name!("Case")).with_selection(
                Selection::new(name!("Owner"))
                    .with_selection(Selection::new(name!("__typename")))
                    .with_selection(
                        Selection::new(name!("Username")).with_type_condition(name!("User")),
                    )
                    .with_selection(
                        Selection::new(name!("DeveloperName")).with_type_condition(name!("Group")),
                    )
                    .with_selection(
                        Selection::new(name!("Name")).with_type_condition(name!("Queue")),
                    ),
            ),
        )
        .unwrap();

        let owner = &typed[0].selections;
        assert_eq!(owner.len(), 3);
        assert!(owner[0].is_typename());
        assert_eq!(owner[1].type_condition, Some(name!("User")));
        assert!(owner[1].applies_to("User"));
        assert!(!owner[1].applies_to("Group"));
        assert_eq!(owner[2].kind, SelectionKind::Leaf(LeafType::String));
    }

    #[test]
    fn unknown_fields_report_type_and_path() {
        let graph = graph();
        let err = annotate(
            &graph,
            Selection::new(name!("Case")).with_alias(name!("cases")).with_selection(
                Selection::new(name!("Owner")).with_selection(
                    Selection::new(name!("Nickname")).with_type_condition(name!("User")),
                ),
            ),
        )
        .unwrap_err();

        assert_eq!(
            err,
            UnknownFieldError {
                field: "Nickname".to_string(),
                parent_type: "User".to_string(),
                path: vec!["cases".to_string(), "Owner".to_string(), "Nickname".to_string()],
            }
        );
    }

    #[test]
    fn composite_sub_fields_are_checked() {
        let graph = graph();
        let user = graph.object("User").unwrap();
        let typed = Annotator::new(&graph, "User")
            .object(
                user,
                &[Selection::new(name!("Address")).with_selection(Selection::new(name!("City")))],
            )
            .unwrap();
        assert_eq!(typed[0].selections[0].kind, SelectionKind::Leaf(LeafType::String));

        let err = Annotator::new(&graph, "User")
            .object(
                user,
                &[Selection::new(name!("Address")).with_selection(Selection::new(name!("Street")))],
            )
            .unwrap_err();
        assert_eq!(err.parent_type, "Address");
        assert_eq!(err.path, vec!["User", "Address", "Street"]);
    }

    #[test]
    fn scalar_leaves_reject_sub_selections() {
        let graph = graph();
        let err = annotate(
            &graph,
            Selection::new(name!("Case")).with_selection(
                Selection::new(name!("Subject")).with_selection(Selection::new(name!("Bogus"))),
            ),
        )
        .unwrap_err();

        assert_eq!(
            err,
            UnknownFieldError {
                field: "Bogus".to_string(),
                parent_type: "String".to_string(),
                path: vec!["Case".to_string(), "Subject".to_string(), "Bogus".to_string()],
            }
        );
    }

    #[test]
    fn fragments_on_the_enclosing_type_merge_with_direct_fields() {
        let graph = graph();
        let typed = annotate(
            &graph,
            Selection::new(name!("Case"))
                .with_selection(
                    Selection::new(name!("Owner")).with_selection(Selection::new(name!("Id"))),
                )
                .with_selection(
                    Selection::new(name!("Owner"))
                        .with_type_condition(name!("Case"))
                        .with_selection(
                            Selection::new(name!("Username")).with_type_condition(name!("User")),
                        ),
                ),
        )
        .unwrap();

        assert_eq!(typed.len(), 1);
        let owner: Vec<&str> = typed[0]
            .selections
            .iter()
            .map(|selection| selection.field_name.as_str())
            .collect();
        assert_eq!(owner, ["Id", "Username"]);
    }

    #[test]
    fn member_specific_union_fields_apply_to_their_member() {
        let graph = graph();
        let typed = annotate(
            &graph,
            Selection::new(name!("Case")).with_selection(
                Selection::new(name!("Owner"))
                    .with_selection(Selection::new(name!("Id")))
                    .with_selection(Selection::new(name!("Username"))),
            ),
        )
        .unwrap();

        let owner = &typed[0].selections;
        assert_eq!(owner[0].type_condition, None);
        assert_eq!(owner[1].type_condition, Some(name!("User")));
    }
}
