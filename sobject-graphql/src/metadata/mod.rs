//! Object metadata as reported by describe calls.
//!
//! The descriptors here deserialize straight from the platform's describe payloads. Keys
//! the schema builder does not need are ignored, and `null` arrays read as empty.

use std::str::FromStr;

use async_trait::async_trait;
use futures::StreamExt;
use futures::TryStreamExt;
use serde::Deserialize;
use serde::Deserializer;
use strum_macros::EnumString;

use crate::error::MetadataFetchError;

mod files;

pub use files::FileMetadataSource;

/// The `type` of a described field.
///
/// Parsing never fails: kinds this crate does not know are kept as [`ScalarKind::Other`]
/// and map to strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScalarKind {
    Address,
    AnyType,
    Base64,
    Boolean,
    Byte,
    Calculated,
    Combobox,
    Currency,
    Date,
    DateTime,
    Double,
    Email,
    EncryptedString,
    Id,
    Int,
    JunctionIdList,
    Location,
    Long,
    MultiPicklist,
    Percent,
    Phone,
    Picklist,
    Reference,
    #[default]
    String,
    Textarea,
    Time,
    Url,
    #[strum(default)]
    Other(String),
}

impl ScalarKind {
    /// Reads a describe `type` value.
    pub fn from_describe(kind: &str) -> Self {
        ScalarKind::from_str(kind).unwrap_or_else(|_| ScalarKind::Other(kind.to_string()))
    }
}

impl<'de> Deserialize<'de> for ScalarKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = Option::<String>::deserialize(deserializer)?;
        Ok(kind.as_deref().map(ScalarKind::from_describe).unwrap_or_default())
    }
}

/// One field of a described object.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,

    #[serde(rename = "type", default)]
    pub kind: ScalarKind,

    /// Objects a reference field points to, in declaration order.
    #[serde(rename = "referenceTo", default, deserialize_with = "non_null_names")]
    pub reference_targets: Vec<String>,

    /// The name a reference is traversed by, e.g. `Account` for `AccountId`.
    #[serde(default)]
    pub relationship_name: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            reference_targets: Vec::new(),
            relationship_name: None,
        }
    }

    /// A reference field named `name`, traversed as `relationship_name`.
    pub fn reference<I, S>(
        name: impl Into<String>,
        targets: I,
        relationship_name: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, ScalarKind::Reference)
            .with_reference_targets(targets)
            .with_relationship_name(relationship_name)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_reference_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reference_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relationship_name(mut self, relationship_name: impl Into<String>) -> Self {
        self.relationship_name = Some(relationship_name.into());
        self
    }

    /// Whether this field links to other objects.
    ///
    /// Decided by the reference targets alone, so a `reference` without targets reads as
    /// a plain leaf and a field of any other kind that carries targets reads as a link.
    pub fn is_reference(&self) -> bool {
        !self.reference_targets.is_empty()
    }
}

/// A relationship traversed from a parent object down to its child records.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRelationshipDescriptor {
    #[serde(rename = "childSObject")]
    pub child_object_name: String,

    /// Children without a relationship name cannot be queried.
    #[serde(default)]
    pub relationship_name: Option<String>,
}

impl ChildRelationshipDescriptor {
    pub fn new(child_object_name: impl Into<String>, relationship_name: Option<&str>) -> Self {
        Self {
            child_object_name: child_object_name.into(),
            relationship_name: relationship_name.map(ToString::to_string),
        }
    }
}

/// The describe result of one object.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<FieldDescriptor>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub child_relationships: Vec<ChildRelationshipDescriptor>,
}

impl ObjectDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            fields: Vec::new(),
            child_relationships: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_child_relationship(
        mut self,
        child_object_name: impl Into<String>,
        relationship_name: Option<&str>,
    ) -> Self {
        self.child_relationships.push(ChildRelationshipDescriptor::new(
            child_object_name,
            relationship_name,
        ));
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_null_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Option::<Vec<Option<String>>>::deserialize(deserializer)?;
    Ok(names
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter(|name| !name.is_empty())
        .collect())
}

/// Where object metadata comes from.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Names of every object in the organization.
    async fn list_objects(&self) -> Result<Vec<String>, MetadataFetchError>;

    /// Describes one object.
    async fn describe(&self, object: &str) -> Result<ObjectDescriptor, MetadataFetchError>;
}

/// Lists every object, then describes them all with at most `concurrency` describe calls
/// in flight.
///
/// Results come back in listing order whatever order the calls complete in. The first
/// failure aborts the whole fetch.
#[tracing::instrument(skip_all, fields(concurrency = concurrency))]
pub async fn fetch_all<S>(
    source: &S,
    concurrency: usize,
) -> Result<Vec<ObjectDescriptor>, MetadataFetchError>
where
    S: MetadataSource + ?Sized,
{
    let names = source.list_objects().await?;
    tracing::debug!(objects = names.len(), "describing objects");

    futures::stream::iter(names.iter())
        .map(|name| source.describe(name))
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}
