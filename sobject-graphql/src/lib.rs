//! A GraphQL view over an organization's objects.
//!
//! ## Usage
//!
//! The schema is inferred from object describe results: every object becomes a type, its
//! fields become scalar fields, and its references become links to parent records or lists of
//! child records. A reference that can point to several objects becomes a union.
//!
//! Each root field of a request is compiled into a single SOQL query, so a whole tree of parent
//! and child records is fetched in one round trip. Queries run over a [`Session`], which is
//! re-authenticated once when it expires.
//!
//! ```no_run
//! # async fn run(configuration: sobject_graphql::Configuration) -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use sobject_graphql::GraphQLService;
//! use sobject_graphql::LiveSchema;
//! use sobject_graphql::RestClient;
//! use sobject_graphql::SObjectSchema;
//! use sobject_graphql::graphql;
//!
//! let client = Arc::new(RestClient::connect(configuration.connection.clone()).await?);
//! let schema = SObjectSchema::fetch(client.as_ref(), &configuration.schema).await?;
//! let service = GraphQLService::new(
//!     Arc::new(LiveSchema::new(schema)),
//!     client,
//!     &configuration.schema,
//! );
//! let response = service
//!     .execute(graphql::Request::new("{ Account { Name Owner { Name } } }"))
//!     .await;
//! # Ok(())
//! # }
//! ```

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub mod configuration;
pub mod error;
pub mod execute;
pub mod graphql;
pub mod metadata;
pub mod query;
pub mod schema;
mod service;
pub mod transport;

pub use configuration::Configuration;
pub use execute::Session;
pub use metadata::FileMetadataSource;
pub use metadata::MetadataSource;
pub use schema::LiveSchema;
pub use schema::SObjectSchema;
pub use service::GraphQLService;
pub use transport::RestClient;

// Services are shared between request tasks.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<GraphQLService>();
    assert_send_sync::<LiveSchema>();
    assert_send_sync::<RestClient>();
};
