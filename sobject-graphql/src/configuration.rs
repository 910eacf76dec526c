//! Configuration, deserialized from YAML.

use std::str::FromStr;
use std::time::Duration;

use schemars::JsonSchema;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::schema::DEFAULT_QUERY_TYPE_NAME;

/// Used when `connection.login_url` is not set.
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

const DEFAULT_API_VERSION: &str = "59.0";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DESCRIBE_CONCURRENCY: usize = 8;
const DEFAULT_MAX_PARENT_DEPTH: usize = 5;

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_query_type_name() -> String {
    DEFAULT_QUERY_TYPE_NAME.to_string()
}

fn default_describe_concurrency() -> usize {
    DEFAULT_DESCRIBE_CONCURRENCY
}

fn default_max_parent_depth() -> usize {
    DEFAULT_MAX_PARENT_DEPTH
}

/// The configuration of the service.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// How to reach and log into the organization
    pub connection: ConnectionConfig,

    /// How the schema is built from the organization's objects
    pub schema: SchemaConfig,
}

/// Parse configuration from a string in YAML syntax
impl FromStr for Configuration {
    type Err = serde_yaml::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(s)
    }
}

/// Connection and OAuth password-flow credentials.
#[derive(Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct ConnectionConfig {
    /// The login host; defaults to https://login.salesforce.com
    pub login_url: Option<Url>,

    /// REST API version, without the leading `v`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// OAuth connected app consumer key
    pub client_id: String,

    /// OAuth connected app consumer secret
    pub client_secret: String,

    pub username: String,

    pub password: String,

    /// Appended to the password when the organization requires it
    pub security_token: Option<String>,

    /// Timeout of every HTTP request in human-readable format; defaults to 30s
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    #[schemars(with = "String", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            login_url: None,
            api_version: default_api_version(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            security_token: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("login_url", &self.login_url)
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Schema build options.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct SchemaConfig {
    /// Name of the root query type; defaults to `Salesforce`
    #[serde(default = "default_query_type_name")]
    pub query_type_name: String,

    /// Fail the build when a relationship points at an object that is not part of the schema,
    /// instead of dropping the relationship
    pub strict_references: bool,

    /// Maximum number of describe calls in flight; defaults to 8
    #[serde(default = "default_describe_concurrency")]
    pub describe_concurrency: usize,

    /// Maximum number of parent relationships followed in one path; defaults to 5
    #[serde(default = "default_max_parent_depth")]
    pub max_parent_depth: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            query_type_name: default_query_type_name(),
            strict_references: false,
            describe_concurrency: default_describe_concurrency(),
            max_parent_depth: default_max_parent_depth(),
        }
    }
}

/// JSON schema of the configuration file.
pub fn generate_config_schema() -> RootSchema {
    schemars::schema_for!(Configuration)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Configuration = "{}".parse().unwrap();

        assert_eq!(config.connection.api_version, "59.0");
        assert_eq!(config.connection.request_timeout, Duration::from_secs(30));
        assert!(config.connection.login_url.is_none());
        assert_eq!(config.schema.query_type_name, "Salesforce");
        assert!(!config.schema.strict_references);
        assert_eq!(config.schema.describe_concurrency, 8);
        assert_eq!(config.schema.max_parent_depth, 5);
    }

    #[test]
    fn parses_a_full_document() {
        let config: Configuration = r#"
connection:
  login_url: https://test.salesforce.com
  api_version: "60.0"
  client_id: consumer-key
  client_secret: consumer-secret
  username: integration@example.com
  password: hunter2
  security_token: abc123
  request_timeout: 2m
schema:
  query_type_name: Crm
  strict_references: true
  describe_concurrency: 2
"#
        .parse()
        .unwrap();

        assert_eq!(
            config.connection.login_url.as_ref().map(Url::as_str),
            Some("https://test.salesforce.com/")
        );
        assert_eq!(config.connection.request_timeout, Duration::from_secs(120));
        assert_eq!(config.connection.security_token.as_deref(), Some("abc123"));
        assert_eq!(config.schema.query_type_name, "Crm");
        assert!(config.schema.strict_references);
        assert_eq!(config.schema.describe_concurrency, 2);
        assert_eq!(config.schema.max_parent_depth, 5);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = "schema:\n  strict: true\n".parse::<Configuration>().unwrap_err();
        assert!(err.to_string().contains("unknown field `strict`"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config: Configuration =
            "connection:\n  password: hunter2\n  client_secret: shh\n".parse().unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("shh"));
    }

    #[test]
    fn config_schema_lists_sections() {
        let schema = serde_json::to_value(generate_config_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("connection"));
        assert!(properties.contains_key("schema"));
    }
}
