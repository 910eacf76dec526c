//! GraphQL schema inferred from object metadata.

use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use arc_swap::ArcSwap;
use sha2::Digest;
use sha2::Sha256;

use crate::configuration::SchemaConfig;
use crate::error::SchemaError;
use crate::metadata::MetadataSource;
use crate::metadata::ObjectDescriptor;

mod builder;
mod graph;
mod sdl;
pub mod type_mapper;

pub use builder::BuildReport;
pub use builder::SchemaBuilder;
pub use graph::FieldKind;
pub use graph::FieldNode;
pub use graph::ObjectTypeNode;
pub use graph::SchemaGraph;
pub use graph::UnionTypeNode;
pub use type_mapper::LeafType;

pub const DEFAULT_QUERY_TYPE_NAME: &str = "Salesforce";

/// A built schema: the object graph, its GraphQL definition and its id.
#[derive(Debug)]
pub struct SObjectSchema {
    graph: SchemaGraph,
    report: BuildReport,
    definition: Valid<Schema>,
    sdl: String,
    schema_id: String,
    query_type_name: String,
}

impl SObjectSchema {
    /// Builds a schema from describe results that are already available.
    pub fn from_descriptors(
        descriptors: &[ObjectDescriptor],
        config: &SchemaConfig,
    ) -> Result<Self, SchemaError> {
        let (graph, report) = SchemaBuilder::new()
            .query_type_name(config.query_type_name.as_str())
            .strict_references(config.strict_references)
            .build(descriptors)?;
        let definition = sdl::to_schema(&graph, &config.query_type_name)?;
        let sdl = definition.to_string();
        let schema_id = Self::schema_id(&sdl);

        Ok(Self {
            graph,
            report,
            definition,
            sdl,
            schema_id,
            query_type_name: config.query_type_name.clone(),
        })
    }

    /// Describes every object of `source` and builds a schema from the results.
    ///
    /// Fails without a schema if any describe call fails.
    pub async fn fetch<S>(source: &S, config: &SchemaConfig) -> Result<Self, SchemaError>
    where
        S: MetadataSource + ?Sized,
    {
        let descriptors =
            crate::metadata::fetch_all(source, config.describe_concurrency).await?;
        Self::from_descriptors(&descriptors, config)
    }

    /// A schema id is the sha256 hash of the schema text.
    pub fn schema_id(sdl: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sdl);
        format!("{:x}", hasher.finalize())
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn definition(&self) -> &Valid<Schema> {
        &self.definition
    }

    pub fn sdl(&self) -> &str {
        &self.sdl
    }

    pub fn id(&self) -> &str {
        &self.schema_id
    }

    pub fn query_type_name(&self) -> &str {
        &self.query_type_name
    }
}

/// The schema currently served.
///
/// Readers take a snapshot with [`LiveSchema::load`] and keep it for a whole request, so a
/// refresh never changes the schema under a request in flight.
pub struct LiveSchema {
    current: ArcSwap<SObjectSchema>,
}

impl LiveSchema {
    pub fn new(schema: SObjectSchema) -> Self {
        Self {
            current: ArcSwap::from_pointee(schema),
        }
    }

    pub fn load(&self) -> Arc<SObjectSchema> {
        self.current.load_full()
    }

    pub fn store(&self, schema: SObjectSchema) {
        let previous = self.current.swap(Arc::new(schema));
        tracing::info!(
            previous = %previous.id(),
            current = %self.current.load().id(),
            "schema swapped"
        );
    }

    /// Rebuilds the schema from `source`; the served schema only changes if the build succeeds.
    #[tracing::instrument(skip_all)]
    pub async fn refresh<S>(
        &self,
        source: &S,
        config: &SchemaConfig,
    ) -> Result<Arc<SObjectSchema>, SchemaError>
    where
        S: MetadataSource + ?Sized,
    {
        let schema = SObjectSchema::fetch(source, config).await?;
        self.store(schema);
        Ok(self.load())
    }
}

impl std::fmt::Debug for LiveSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSchema")
            .field("schema_id", &self.current.load().id())
            .finish()
    }
}
