use std::collections::HashSet;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;
use itertools::Itertools;

use super::graph::FieldKind;
use super::graph::FieldNode;
use super::graph::ObjectTypeNode;
use super::graph::SchemaGraph;
use super::graph::UnionTypeNode;
use super::type_mapper::LeafType;
use super::type_mapper::map_scalar;
use crate::error::SchemaError;
use crate::error::UnresolvedReferenceError;
use crate::metadata::ObjectDescriptor;

/// Type names objects cannot take because the schema defines them itself.
const COMPOSITE_TYPE_NAMES: [&str; 2] = ["Address", "Location"];

/// What a build left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Objects without any usable field, or whose name is taken by a built-in type.
    pub dropped_objects: Vec<String>,

    /// Links elided because their target is not part of the graph.
    pub unresolved_references: Vec<UnresolvedReferenceError>,
}

/// Builds a [`SchemaGraph`] from describe results in two passes.
///
/// Pass 1 turns every describe result into an object with leaves and link placeholders.
/// Pass 2 runs once every object is registered and resolves the placeholders into links,
/// synthesizing a union for each polymorphic reference.
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    query_type_name: String,
    strict_references: bool,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self {
            query_type_name: super::DEFAULT_QUERY_TYPE_NAME.to_string(),
            strict_references: false,
        }
    }
}

#[derive(Debug)]
enum PendingKind {
    Leaf(LeafType),
    Parent(Vec<String>),
    Child(String),
}

#[derive(Debug)]
struct PendingField {
    name: Name,
    description: String,
    kind: PendingKind,
}

#[derive(Debug)]
struct PendingObject {
    name: Name,
    description: String,
    fields: IndexMap<Name, PendingField>,
}

impl PendingObject {
    fn has_resolvable_field(&self, live: &HashSet<Name>) -> bool {
        self.fields.values().any(|field| match &field.kind {
            PendingKind::Leaf(_) => true,
            PendingKind::Child(target) => live.contains(target.as_str()),
            PendingKind::Parent(targets) => {
                targets.iter().any(|target| live.contains(target.as_str()))
            }
        })
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The name of the root query type, reserved for it.
    pub fn query_type_name(mut self, query_type_name: impl Into<String>) -> Self {
        self.query_type_name = query_type_name.into();
        self
    }

    /// Fail the build on the first link to an object outside the graph instead of dropping it.
    pub fn strict_references(mut self, strict_references: bool) -> Self {
        self.strict_references = strict_references;
        self
    }

    #[tracing::instrument(skip_all, fields(objects = descriptors.len()))]
    pub fn build(
        &self,
        descriptors: &[ObjectDescriptor],
    ) -> Result<(SchemaGraph, BuildReport), SchemaError> {
        let mut report = BuildReport::default();

        let mut pending: Vec<PendingObject> = Vec::with_capacity(descriptors.len());
        let mut registered = HashSet::new();
        for descriptor in descriptors {
            match self.collect_object(descriptor) {
                Some(object) if registered.insert(object.name.clone()) => pending.push(object),
                Some(object) => {
                    tracing::debug!(object = %object.name, "object described twice, keeping the first");
                }
                None => report.dropped_objects.push(descriptor.name.clone()),
            }
        }

        // Objects whose only fields link to dropped objects are dropped in turn.
        loop {
            let live: HashSet<Name> = pending.iter().map(|object| object.name.clone()).collect();
            let before = pending.len();
            pending.retain(|object| {
                let keep = object.has_resolvable_field(&live);
                if !keep {
                    tracing::debug!(object = %object.name, "dropping object, all its links are unresolved");
                    report.dropped_objects.push(object.name.to_string());
                }
                keep
            });
            if pending.len() == before {
                break;
            }
        }

        let live: HashSet<Name> = pending.iter().map(|object| object.name.clone()).collect();
        let mut graph = SchemaGraph::default();
        for object in pending {
            let node = self.resolve_object(object, &live, &mut graph, &mut report)?;
            graph.objects.insert(node.name.clone(), node);
        }

        tracing::info!(
            objects = graph.objects.len(),
            unions = graph.unions.len(),
            dropped_objects = report.dropped_objects.len(),
            unresolved_references = report.unresolved_references.len(),
            "schema graph built"
        );
        Ok((graph, report))
    }

    /// Pass 1: leaves and link placeholders of one object.
    fn collect_object(&self, descriptor: &ObjectDescriptor) -> Option<PendingObject> {
        let Ok(name) = Name::new(&descriptor.name) else {
            tracing::warn!(object = %descriptor.name, "skipping object, its name is not a valid GraphQL name");
            return None;
        };
        if COMPOSITE_TYPE_NAMES.contains(&name.as_str()) || name.as_str() == self.query_type_name {
            tracing::warn!(object = %name, "skipping object, its name is reserved");
            return None;
        }

        let mut fields = IndexMap::default();
        let mut add = |field: PendingField| {
            if fields.contains_key(&field.name) {
                tracing::debug!(object = %name, field = %field.name, "duplicate field name, keeping the first");
            } else {
                fields.insert(field.name.clone(), field);
            }
        };

        for field in &descriptor.fields {
            let Some(column) = field_name(&name, &field.name) else {
                continue;
            };
            add(PendingField {
                name: column,
                description: field.label.clone(),
                kind: PendingKind::Leaf(map_scalar(&field.kind)),
            });

            if !field.is_reference() {
                continue;
            }
            let Some(relationship_name) = field.relationship_name.as_deref() else {
                tracing::trace!(object = %name, field = %field.name, "reference has no relationship name");
                continue;
            };
            let Some(relationship_name) = field_name(&name, relationship_name) else {
                continue;
            };
            add(PendingField {
                name: relationship_name,
                description: field.label.clone(),
                kind: PendingKind::Parent(field.reference_targets.clone()),
            });
        }

        for child in &descriptor.child_relationships {
            let Some(relationship_name) = child.relationship_name.as_deref() else {
                continue;
            };
            let Some(relationship_name) = field_name(&name, relationship_name) else {
                continue;
            };
            add(PendingField {
                description: relationship_name.to_string(),
                name: relationship_name,
                kind: PendingKind::Child(child.child_object_name.clone()),
            });
        }

        if fields.is_empty() {
            tracing::debug!(object = %name, "dropping object without fields");
            return None;
        }

        Some(PendingObject {
            name,
            description: descriptor.label.clone(),
            fields,
        })
    }

    /// Pass 2: resolve the placeholders of one object against the registered objects.
    fn resolve_object(
        &self,
        object: PendingObject,
        live: &HashSet<Name>,
        graph: &mut SchemaGraph,
        report: &mut BuildReport,
    ) -> Result<ObjectTypeNode, SchemaError> {
        let mut fields = IndexMap::default();
        for field in object.fields.into_values() {
            let kind = match field.kind {
                PendingKind::Leaf(leaf) => Some(FieldKind::Leaf(leaf)),
                PendingKind::Child(target) => {
                    match live.get(target.as_str()) {
                        Some(target) => Some(FieldKind::ChildLink(target.clone())),
                        None => {
                            self.elide(report, &object.name, &field.name, &target)?;
                            None
                        }
                    }
                }
                PendingKind::Parent(targets) => {
                    let mut survivors = Vec::with_capacity(targets.len());
                    for target in targets.iter().unique() {
                        match live.get(target.as_str()) {
                            Some(target) => survivors.push(target.clone()),
                            None => self.elide(report, &object.name, &field.name, target)?,
                        }
                    }
                    match survivors.len() {
                        0 => None,
                        1 => survivors.pop().map(FieldKind::ParentLink),
                        _ => Some(FieldKind::Union(union_for(graph, survivors)?)),
                    }
                }
            };

            if let Some(kind) = kind {
                fields.insert(
                    field.name.clone(),
                    FieldNode {
                        name: field.name,
                        description: field.description,
                        kind,
                    },
                );
            }
        }

        Ok(ObjectTypeNode {
            name: object.name,
            description: object.description,
            fields,
        })
    }

    fn elide(
        &self,
        report: &mut BuildReport,
        parent_type: &Name,
        field: &Name,
        target: &str,
    ) -> Result<(), UnresolvedReferenceError> {
        let error = UnresolvedReferenceError {
            parent_type: parent_type.to_string(),
            field: field.to_string(),
            target: target.to_string(),
        };
        if self.strict_references {
            return Err(error);
        }

        tracing::warn!(
            parent_type = %parent_type,
            field = %field,
            target = %target,
            "dropping link to an object that is not part of the schema"
        );
        report.unresolved_references.push(error);
        Ok(())
    }
}

fn field_name(object: &Name, field: &str) -> Option<Name> {
    match Name::new(field) {
        Ok(name) if !name.as_str().starts_with("__") => Some(name),
        _ => {
            tracing::warn!(object = %object, field = %field, "skipping field, its name is not a valid GraphQL name");
            None
        }
    }
}

/// Returns the union over `members`, registering it on first use.
fn union_for(
    graph: &mut SchemaGraph,
    members: Vec<Name>,
) -> Result<Arc<UnionTypeNode>, SchemaError> {
    let name = UnionTypeNode::name_for(members.iter().map(Name::as_str));
    if let Some(union) = graph.unions.get(name.as_str()) {
        return Ok(union.clone());
    }

    let name = Name::new(&name).map_err(|err| SchemaError::Validation(err.to_string()))?;
    let union = Arc::new(UnionTypeNode {
        name: name.clone(),
        members,
    });
    graph.unions.insert(name, union.clone());
    Ok(union)
}
