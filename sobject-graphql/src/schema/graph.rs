//! The resolved object graph.
//!
//! Every link in a [`SchemaGraph`] points at an object registered in the same graph. The graph
//! is built once by [`SchemaBuilder`](super::SchemaBuilder) and never mutated afterwards.

use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::schema::Type;

use super::type_mapper::LeafType;

/// The shape of a field, decided once when the graph is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// A scalar or composite column.
    Leaf(LeafType),
    /// A lookup from a child record to its single parent object.
    ParentLink(Name),
    /// The records of a child object pointing back at this one.
    ChildLink(Name),
    /// A lookup whose parent may be one of several objects.
    Union(Arc<UnionTypeNode>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldNode {
    /// The column or relationship name, identical in GraphQL and SOQL.
    pub name: Name,
    pub description: String,
    pub kind: FieldKind,
}

impl FieldNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, FieldKind::Leaf(_))
    }

    /// Parent links, unions and child links all traverse to other objects.
    pub fn is_relationship(&self) -> bool {
        !self.is_leaf()
    }

    pub fn is_child_relationship(&self) -> bool {
        matches!(self.kind, FieldKind::ChildLink(_))
    }

    /// Objects this field links to, in declaration order. Empty for leaves.
    pub fn target_object_names(&self) -> &[Name] {
        match &self.kind {
            FieldKind::Leaf(_) => &[],
            FieldKind::ParentLink(target) | FieldKind::ChildLink(target) => {
                std::slice::from_ref(target)
            }
            FieldKind::Union(union) => &union.members,
        }
    }

    /// The GraphQL output type of this field.
    pub fn ty(&self) -> Type {
        match &self.kind {
            FieldKind::Leaf(leaf) => leaf.ty(),
            FieldKind::ParentLink(target) => Type::Named(target.clone()),
            FieldKind::ChildLink(target) => {
                Type::Named(target.clone()).non_null().list().non_null()
            }
            FieldKind::Union(union) => Type::Named(union.name.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectTypeNode {
    pub name: Name,
    pub description: String,
    pub fields: IndexMap<Name, FieldNode>,
}

impl ObjectTypeNode {
    pub fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.get(name)
    }
}

/// A union of the objects a polymorphic reference may point to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionTypeNode {
    pub name: Name,
    /// In the declaration order of the reference targets.
    pub members: Vec<Name>,
}

impl UnionTypeNode {
    /// Name of the union over `members`.
    ///
    /// Each member name is capitalized and prepended, so `[User, Group]` becomes
    /// `UnionGroupUser`.
    pub fn name_for<'a>(members: impl IntoIterator<Item = &'a str>) -> String {
        let suffix = members.into_iter().fold(String::new(), |suffix, member| {
            let mut chars = member.chars();
            match chars.next() {
                Some(first) => {
                    let mut prefixed: String = first.to_uppercase().collect();
                    prefixed.push_str(chars.as_str());
                    prefixed.push_str(&suffix);
                    prefixed
                }
                None => suffix,
            }
        });
        format!("Union{suffix}")
    }
}

/// Objects and unions of one schema build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaGraph {
    pub(crate) objects: IndexMap<Name, ObjectTypeNode>,
    pub(crate) unions: IndexMap<Name, Arc<UnionTypeNode>>,
}

impl SchemaGraph {
    pub fn object(&self, name: &str) -> Option<&ObjectTypeNode> {
        self.objects.get(name)
    }

    pub fn union(&self, name: &str) -> Option<&Arc<UnionTypeNode>> {
        self.unions.get(name)
    }

    /// Objects in registration order.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectTypeNode> {
        self.objects.values()
    }

    /// Unions in the order they were first needed.
    pub fn unions(&self) -> impl Iterator<Item = &Arc<UnionTypeNode>> {
        self.unions.values()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
