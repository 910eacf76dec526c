//! Conversion of a [`SchemaGraph`] into an `apollo-compiler` schema.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::Type;
use apollo_compiler::schema::UnionType;
use apollo_compiler::validation::Valid;

use super::graph::FieldNode;
use super::graph::ObjectTypeNode;
use super::graph::SchemaGraph;
use super::graph::UnionTypeNode;
use super::type_mapper::composite_types;
use crate::error::SchemaError;

fn description(text: &str) -> Option<Node<str>> {
    (!text.is_empty()).then(|| text.into())
}

fn field_definition(
    name: Name,
    description: Option<Node<str>>,
    ty: Type,
) -> Component<FieldDefinition> {
    Component::new(FieldDefinition {
        description,
        name,
        arguments: Vec::new(),
        ty,
        directives: Default::default(),
    })
}

fn object_type(object: &ObjectTypeNode) -> ObjectType {
    let fields: IndexMap<Name, Component<FieldDefinition>> = object
        .fields
        .values()
        .map(|field: &FieldNode| {
            (
                field.name.clone(),
                field_definition(field.name.clone(), description(&field.description), field.ty()),
            )
        })
        .collect();

    ObjectType {
        description: description(&object.description),
        name: object.name.clone(),
        implements_interfaces: Default::default(),
        directives: Default::default(),
        fields,
    }
}

fn union_type(union: &UnionTypeNode) -> UnionType {
    let members: IndexSet<ComponentName> = union
        .members
        .iter()
        .map(|member| ComponentName::from(member.clone()))
        .collect();

    UnionType {
        description: None,
        name: union.name.clone(),
        directives: Default::default(),
        members,
    }
}

/// The query root: one list field per object, named after it.
fn query_type(graph: &SchemaGraph, name: Name) -> ObjectType {
    let fields = graph
        .objects()
        .map(|object| {
            let ty = Type::Named(object.name.clone()).non_null().list().non_null();
            (
                object.name.clone(),
                field_definition(object.name.clone(), description(&object.description), ty),
            )
        })
        .collect();

    ObjectType {
        description: None,
        name,
        implements_interfaces: Default::default(),
        directives: Default::default(),
        fields,
    }
}

/// Builds and validates the GraphQL schema of `graph` under the root query type
/// `query_type_name`.
pub(crate) fn to_schema(
    graph: &SchemaGraph,
    query_type_name: &str,
) -> Result<Valid<Schema>, SchemaError> {
    let query_type_name =
        Name::new(query_type_name).map_err(|err| SchemaError::Validation(err.to_string()))?;

    let mut schema = Schema::new();
    schema.schema_definition.make_mut().query = Some(query_type_name.clone().into());
    schema.types.insert(
        query_type_name.clone(),
        ExtendedType::Object(Node::new(query_type(graph, query_type_name))),
    );
    for object in graph.objects() {
        schema.types.insert(
            object.name.clone(),
            ExtendedType::Object(Node::new(object_type(object))),
        );
    }
    for union in graph.unions() {
        schema.types.insert(
            union.name.clone(),
            ExtendedType::Union(Node::new(union_type(union))),
        );
    }
    for composite in composite_types() {
        schema
            .types
            .insert(composite.name.clone(), ExtendedType::Object(composite));
    }

    schema
        .validate()
        .map_err(|invalid| SchemaError::Validation(invalid.errors.to_string()))
}
