//! Leaf output types of described fields.

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::Type;

use crate::metadata::ScalarKind;

/// The output type of a leaf field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeafType {
    String,
    Int,
    Float,
    Boolean,
    /// Always non-null.
    Id,
    StringList,
    Address,
    Location,
}

const ADDRESS_FIELDS: &[(&str, &str)] = &[
    ("Accuracy", "Accuracy level of the geocode for the address"),
    ("City", "The city detail for the address"),
    ("Country", "The country detail for the address"),
];

const LOCATION_FIELDS: &[(&str, &str)] = &[
    ("latitude", "Latitude of the location"),
    ("longitude", "Longitude of the location"),
];

/// Maps a described field kind to its leaf type.
///
/// Total: kinds without a dedicated mapping are strings. References are resolved by the
/// schema builder and never reach this function; if one does, it reads as a string.
pub fn map_scalar(kind: &ScalarKind) -> LeafType {
    match kind {
        ScalarKind::Id => LeafType::Id,
        ScalarKind::MultiPicklist => LeafType::StringList,
        ScalarKind::Currency | ScalarKind::Percent | ScalarKind::Double => LeafType::Float,
        ScalarKind::Int => LeafType::Int,
        ScalarKind::Boolean => LeafType::Boolean,
        ScalarKind::Address => LeafType::Address,
        ScalarKind::Location => LeafType::Location,
        _ => LeafType::String,
    }
}

impl LeafType {
    /// The GraphQL type of a field with this leaf type.
    pub fn ty(self) -> Type {
        match self {
            LeafType::String => Type::Named(name!("String")),
            LeafType::Int => Type::Named(name!("Int")),
            LeafType::Float => Type::Named(name!("Float")),
            LeafType::Boolean => Type::Named(name!("Boolean")),
            LeafType::Id => Type::NonNullNamed(name!("ID")),
            LeafType::StringList => Type::List(Box::new(Type::Named(name!("String")))),
            LeafType::Address => Type::Named(name!("Address")),
            LeafType::Location => Type::Named(name!("Location")),
        }
    }

    /// Sub-fields of the composite leaves, `None` for scalars.
    pub fn composite_fields(self) -> Option<impl Iterator<Item = &'static str>> {
        let fields = match self {
            LeafType::Address => ADDRESS_FIELDS,
            LeafType::Location => LOCATION_FIELDS,
            _ => return None,
        };
        Some(fields.iter().map(|(name, _)| *name))
    }

    /// Name of the composite object type, `None` for scalars.
    pub fn composite_type_name(self) -> Option<Name> {
        match self {
            LeafType::Address => Some(name!("Address")),
            LeafType::Location => Some(name!("Location")),
            _ => None,
        }
    }
}

/// Definitions of the `Address` and `Location` object types.
pub(crate) fn composite_types() -> [Node<ObjectType>; 2] {
    [
        composite_type(
            name!("Address"),
            [name!("Accuracy"), name!("City"), name!("Country")],
            ADDRESS_FIELDS,
        ),
        composite_type(
            name!("Location"),
            [name!("latitude"), name!("longitude")],
            LOCATION_FIELDS,
        ),
    ]
}

fn composite_type<const N: usize>(
    name: Name,
    field_names: [Name; N],
    fields: &[(&'static str, &'static str)],
) -> Node<ObjectType> {
    let mut field_map = IndexMap::default();
    for (field_name, (_, description)) in field_names.into_iter().zip(fields) {
        field_map.insert(
            field_name.clone(),
            Component::new(FieldDefinition {
                description: Some((*description).into()),
                name: field_name,
                arguments: Vec::new(),
                ty: Type::Named(name!("String")),
                directives: Default::default(),
            }),
        );
    }

    Node::new(ObjectType {
        description: None,
        name,
        implements_interfaces: Default::default(),
        directives: Default::default(),
        fields: field_map,
    })
}
