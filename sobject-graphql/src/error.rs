//! Schema build and request errors.
use displaydoc::Display;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::graphql;

/// Error types raised while fetching object metadata.
///
/// Any of these is fatal to a schema build: no partial schema is ever published.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MetadataFetchError {
    /// could not list objects: {reason}
    List {
        /// The failure reason.
        reason: String,
    },

    /// could not describe object '{object}': {reason}
    Describe {
        /// The object being described.
        object: String,

        /// The failure reason.
        reason: String,
    },
}

/// '{parent_type}.{field}' references object '{target}' which is not part of the schema
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReferenceError {
    /// The object owning the link.
    pub parent_type: String,
    /// The relationship field name.
    pub field: String,
    /// The object name that could not be resolved.
    pub target: String,
}

/// Error types for schema builds.
#[derive(Error, Display, Debug, Clone)]
#[non_exhaustive]
pub enum SchemaError {
    /// {0}
    MetadataFetch(#[from] MetadataFetchError),

    /// {0}
    UnresolvedReference(#[from] UnresolvedReferenceError),

    /// the generated schema is invalid: {0}
    Validation(String),
}

/// Errors reported by a [`Session`](crate::execute::Session).
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// session expired: {message}
    AuthExpired {
        /// The message returned by the platform.
        message: String,
    },

    /// authentication failed: {message}
    Authentication {
        /// The reason the login was refused.
        message: String,
    },

    /// query failed with {error_code}: {message}
    Query {
        /// The platform error code, e.g. `MALFORMED_QUERY`.
        error_code: String,

        /// The platform error message.
        message: String,
    },

    /// HTTP request failed: {0}
    Http(String),

    /// response was malformed: {reason}
    MalformedResponse {
        /// The reason the response could not be read.
        reason: String,
    },
}

impl TransportError {
    pub(crate) fn is_auth_expired(&self) -> bool {
        matches!(self, TransportError::AuthExpired { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

/// query execution failed: {0}
///
/// Wraps the session error unmodified. A session that expires again after the single
/// re-authentication also ends up here.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[ignore_extra_doc_attributes]
pub struct QueryExecutionError(pub TransportError);

/// field '{field}' does not exist on type '{parent_type}'
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldError {
    /// The selected field name.
    pub field: String,
    /// The type the field was looked up on.
    pub parent_type: String,
    /// Response keys from the root field down to the unknown field.
    pub path: Vec<String>,
}

/// Error types scoped to a single GraphQL request.
#[derive(Error, Display, Debug, Clone)]
#[non_exhaustive]
pub enum RequestError {
    /// could not parse the query document: {message}
    Parse {
        /// The parser diagnostics.
        message: String,
    },

    /// the document does not contain any operation
    NoOperation,

    /// the document contains several operations, an operation name is required
    AmbiguousOperation,

    /// operation '{0}' was not found in the document
    UnknownOperation(String),

    /// only query operations are supported, got a {0}
    UnsupportedOperation(String),

    /// fragment '{0}' is not defined
    UnknownFragment(String),

    /// fragment '{0}' spreads itself
    FragmentCycle(String),

    /// {0}
    UnknownField(#[from] UnknownFieldError),

    /// {0}
    QueryExecution(#[from] QueryExecutionError),
}

/// Trait used to get an extension code from an error.
pub trait ErrorExtension
where
    Self: Sized + std::fmt::Display,
{
    fn extension_code(&self) -> String;

    fn custom_extension_details(&self, _extensions: &mut Map<String, Value>) {}

    /// Convert the error to a GraphQL error located at `path`.
    fn to_graphql_error(&self, path: Vec<String>) -> graphql::Error {
        let mut extensions = Map::new();
        extensions.insert("code".to_string(), self.extension_code().into());
        self.custom_extension_details(&mut extensions);

        graphql::Error {
            message: self.to_string(),
            path,
            extensions,
        }
    }
}

impl ErrorExtension for RequestError {
    fn extension_code(&self) -> String {
        match self {
            RequestError::Parse { .. } => "GRAPHQL_PARSE_FAILED",
            RequestError::NoOperation
            | RequestError::AmbiguousOperation
            | RequestError::UnknownOperation(_)
            | RequestError::UnknownFragment(_)
            | RequestError::FragmentCycle(_) => "GRAPHQL_VALIDATION_FAILED",
            RequestError::UnsupportedOperation(_) => "OPERATION_NOT_SUPPORTED",
            RequestError::UnknownField(_) => "UNKNOWN_FIELD",
            RequestError::QueryExecution(_) => "QUERY_EXECUTION_ERROR",
        }
        .to_string()
    }

    fn custom_extension_details(&self, extensions: &mut Map<String, Value>) {
        match self {
            RequestError::UnknownField(err) => {
                extensions.insert("field".to_string(), err.field.clone().into());
                extensions.insert("type".to_string(), err.parent_type.clone().into());
            }
            RequestError::QueryExecution(QueryExecutionError(TransportError::Query {
                error_code,
                ..
            })) => {
                extensions.insert("platformCode".to_string(), error_code.clone().into());
            }
            _ => {}
        }
    }
}
