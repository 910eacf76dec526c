use apollo_compiler::Name;
use itertools::Itertools;

use super::selection::Selection;
use super::typed::Annotator;
use super::typed::SelectionKind;
use super::typed::TypedSelection;
use crate::error::UnknownFieldError;
use crate::schema::SchemaGraph;
use crate::schema::UnionTypeNode;

const DEFAULT_MAX_PARENT_DEPTH: usize = 5;

/// The SOQL query answering one root field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlan {
    pub response_key: Name,
    /// The object the query selects from.
    pub object: Name,
    pub soql: String,
    /// The annotated selections, used to shape the returned rows.
    pub selections: Vec<TypedSelection>,
}

/// Compiles selections into SOQL, one query per root field.
///
/// A query fetches the selected leaves, follows parent links as dotted paths and fetches child
/// links through correlated subqueries, all in a single round trip. Polymorphic links on the
/// queried object become `TYPEOF` clauses with one branch per member.
#[derive(Clone, Debug)]
pub struct QueryPlanner {
    max_parent_depth: usize,
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self {
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
        }
    }
}

impl QueryPlanner {
    /// `max_parent_depth` bounds the number of parent links in one path.
    pub fn new(max_parent_depth: usize) -> Self {
        Self { max_parent_depth }
    }

    /// Plans the root field `root`, selected on the query type `query_type_name`.
    pub fn plan(
        &self,
        graph: &SchemaGraph,
        query_type_name: &str,
        root: &Selection,
    ) -> Result<QueryPlan, UnknownFieldError> {
        let object = graph.object(root.field_name.as_str()).ok_or_else(|| UnknownFieldError {
            field: root.field_name.to_string(),
            parent_type: query_type_name.to_string(),
            path: vec![root.response_key.to_string()],
        })?;

        let selections =
            Annotator::new(graph, root.response_key.as_str()).object(object, &root.selections)?;
        let soql = self.compile(&object.name, &selections);
        tracing::debug!(object = %object.name, soql = %soql, "planned query");

        Ok(QueryPlan {
            response_key: root.response_key.clone(),
            object: object.name.clone(),
            soql,
            selections,
        })
    }

    /// `SELECT <leaves>, <parent paths>, <child subqueries> FROM <object>`.
    ///
    /// `Id` always leads the list. Items are deduplicated by their literal text. `TYPEOF` is
    /// only valid in the outer select list, so polymorphic links reached through a parent path
    /// or a child subquery fetch the fields shared by every member.
    pub fn compile(&self, object: &str, selections: &[TypedSelection]) -> String {
        let children = selections
            .iter()
            .filter(|selection| selection.is_child_relationship())
            .map(|child| {
                format!(
                    "(SELECT {} FROM {})",
                    self.columns(&child.selections, false).join(", "),
                    child.field_name
                )
            });

        let items = self
            .columns(selections, true)
            .into_iter()
            .chain(children)
            .unique()
            .join(", ");
        format!("SELECT {items} FROM {object}")
    }

    /// Leaves and parent paths of one record, with `TYPEOF` clauses when `polymorphic`.
    fn columns(&self, selections: &[TypedSelection], polymorphic: bool) -> Vec<String> {
        let leaves = std::iter::once("Id".to_string()).chain(
            selections
                .iter()
                .filter(|selection| selection.is_leaf())
                .map(|leaf| leaf.field_name.to_string()),
        );
        let parents = selections
            .iter()
            .flat_map(|selection| match &selection.kind {
                SelectionKind::Union(union) if polymorphic => self.typeof_clause(selection, union),
                _ => self.parent_paths(selection, 1),
            });

        leaves.chain(parents).unique().collect()
    }

    /// `TYPEOF <link> WHEN <member> THEN <columns> ... END`, with a branch for every member.
    fn typeof_clause(&self, selection: &TypedSelection, union: &UnionTypeNode) -> Vec<String> {
        if self.max_parent_depth == 0 {
            return Vec::new();
        }
        let branches = union
            .members
            .iter()
            .map(|member| {
                let applicable = selection
                    .selections
                    .iter()
                    .filter(|nested| nested.applies_to(member));
                let leaves = applicable
                    .clone()
                    .filter(|nested| nested.is_leaf())
                    .map(|leaf| leaf.field_name.to_string());
                let parents = applicable.flat_map(|nested| self.parent_paths(nested, 2));
                let columns = std::iter::once("Id".to_string())
                    .chain(leaves)
                    .chain(parents)
                    .unique()
                    .join(", ");
                format!("WHEN {member} THEN {columns}")
            })
            .join(" ");
        vec![format!("TYPEOF {} {branches} END", selection.field_name)]
    }

    /// Dotted paths through a parent link, `hops` being the number of links in the path.
    ///
    /// Selections past the last allowed link are dropped, as are fields selected for only one
    /// member of a polymorphic link.
    fn parent_paths(&self, selection: &TypedSelection, hops: usize) -> Vec<String> {
        if hops > self.max_parent_depth
            || !matches!(
                selection.kind,
                SelectionKind::ParentLink(_) | SelectionKind::Union(_)
            )
        {
            return Vec::new();
        }

        let relationship = &selection.field_name;
        let mut paths = vec![format!("{relationship}.Id")];
        for nested in &selection.selections {
            if nested.type_condition.is_some() {
                continue;
            }
            if nested.is_leaf() {
                paths.push(format!("{relationship}.{}", nested.field_name));
            } else {
                paths.extend(
                    self.parent_paths(nested, hops + 1)
                        .into_iter()
                        .map(|path| format!("{relationship}.{path}")),
                );
            }
        }
        paths
    }
}
