//! GraphQL request and response types.
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// A GraphQL request, as posted by a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// The query document.
    pub query: String,

    /// The operation to execute when the document holds several.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
        }
    }

    pub fn with_operation_name(mut self, operation_name: impl Into<String>) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }
}

/// A GraphQL error.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The response path of the field that failed.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub path: Vec<String>,

    /// The optional GraphQL extensions.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub extensions: Map<String, Value>,
}

/// A GraphQL response.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The errors that occurred while resolving the request.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,
}

impl Response {
    /// A response carrying only errors, used when nothing could be resolved.
    pub(crate) fn from_errors(errors: Vec<Error>) -> Self {
        Self { data: None, errors }
    }
}
