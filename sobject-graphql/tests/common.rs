use std::path::PathBuf;

use sobject_graphql::FileMetadataSource;
use sobject_graphql::SObjectSchema;
use sobject_graphql::configuration::SchemaConfig;

/// Describe results of a small organization: accounts, contacts, cases, users and groups.
pub(crate) fn describe_source() -> FileMetadataSource {
    FileMetadataSource::new(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("describe"),
    )
}

pub(crate) async fn schema() -> SObjectSchema {
    SObjectSchema::fetch(&describe_source(), &SchemaConfig::default())
        .await
        .unwrap()
}
