use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::configuration::ConnectionConfig;
use crate::configuration::DEFAULT_LOGIN_URL;
use crate::error::MetadataFetchError;
use crate::error::TransportError;
use crate::execute::Session;
use crate::metadata::MetadataSource;
use crate::metadata::ObjectDescriptor;

const TOKEN_PATH: &str = "services/oauth2/token";
const INVALID_SESSION_ID: &str = "INVALID_SESSION_ID";

#[derive(Clone)]
struct AccessToken {
    access_token: String,
    instance_url: Url,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: Url,
}

#[derive(Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformError {
    message: String,
    error_code: String,
}

#[derive(Deserialize)]
struct GlobalDescribe {
    sobjects: Vec<GlobalDescribeObject>,
}

#[derive(Deserialize)]
struct GlobalDescribeObject {
    name: String,
}

/// A REST API client logged in with the OAuth username-password flow.
///
/// Serves object metadata for schema builds and runs queries for requests.
pub struct RestClient {
    http: reqwest::Client,
    login_url: Url,
    config: ConnectionConfig,
    token: RwLock<Option<AccessToken>>,
}

impl RestClient {
    /// A client that has not logged in yet.
    pub fn new(config: ConnectionConfig) -> Result<Self, TransportError> {
        let login_url = match &config.login_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_LOGIN_URL)
                .map_err(|err| TransportError::Http(err.to_string()))?,
        };
        let login_url = as_directory(login_url);
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            login_url,
            config,
            token: RwLock::new(None),
        })
    }

    /// Creates a client and logs in.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, TransportError> {
        let client = Self::new(config)?;
        client.login().await?;
        Ok(client)
    }

    /// Requests a new access token, replacing the current one.
    #[tracing::instrument(skip_all, fields(login_url = %self.login_url))]
    pub async fn login(&self) -> Result<(), TransportError> {
        let url = self
            .login_url
            .join(TOKEN_PATH)
            .map_err(|err| TransportError::Http(err.to_string()))?;
        let password = match &self.config.security_token {
            Some(token) => format!("{}{token}", self.config.password),
            None => self.config.password.clone(),
        };

        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("username", self.config.username.as_str()),
                ("password", password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = match serde_json::from_str::<TokenError>(&body) {
                Ok(refused) => refused.error_description.unwrap_or(refused.error),
                Err(_) => format!("{status}: {body}"),
            };
            return Err(TransportError::Authentication { message });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|err| TransportError::MalformedResponse {
                reason: err.to_string(),
            })?;
        tracing::info!(instance_url = %token.instance_url, "logged in");
        *self.token.write() = Some(AccessToken {
            access_token: token.access_token,
            instance_url: as_directory(token.instance_url),
        });
        Ok(())
    }

    fn data_url(&self, token: &AccessToken, path: &str) -> Result<Url, TransportError> {
        token
            .instance_url
            .join(&format!("services/data/v{}/{path}", self.config.api_version))
            .map_err(|err| TransportError::Http(err.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let token = self
            .token
            .read()
            .clone()
            .ok_or_else(|| TransportError::AuthExpired {
                message: "not logged in".to_string(),
            })?;
        let url = self.data_url(&token, path)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&token.access_token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|err| TransportError::MalformedResponse {
                    reason: err.to_string(),
                });
        }
        let body = response.text().await.unwrap_or_default();
        Err(platform_error(status, &body))
    }
}

/// Reads the `[{message, errorCode}]` body of a failed API call.
/// Relative paths join below `url` only when its path ends with a `/`.
fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn platform_error(status: StatusCode, body: &str) -> TransportError {
    let first = serde_json::from_str::<Vec<PlatformError>>(body)
        .ok()
        .and_then(|errors| errors.into_iter().next());

    match first {
        Some(error)
            if status == StatusCode::UNAUTHORIZED || error.error_code == INVALID_SESSION_ID =>
        {
            TransportError::AuthExpired {
                message: error.message,
            }
        }
        Some(error) => TransportError::Query {
            error_code: error.error_code,
            message: error.message,
        },
        None if status == StatusCode::UNAUTHORIZED => TransportError::AuthExpired {
            message: body.to_string(),
        },
        None => TransportError::Http(format!("{status}: {body}")),
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("login_url", &self.login_url)
            .field("api_version", &self.config.api_version)
            .field("logged_in", &self.token.read().is_some())
            .finish()
    }
}

#[async_trait]
impl MetadataSource for RestClient {
    async fn list_objects(&self) -> Result<Vec<String>, MetadataFetchError> {
        let global: GlobalDescribe =
            self.get("sobjects/", &[])
                .await
                .map_err(|err| MetadataFetchError::List {
                    reason: err.to_string(),
                })?;
        Ok(global.sobjects.into_iter().map(|object| object.name).collect())
    }

    async fn describe(&self, object: &str) -> Result<ObjectDescriptor, MetadataFetchError> {
        self.get(&format!("sobjects/{object}/describe/"), &[])
            .await
            .map_err(|err| MetadataFetchError::Describe {
                object: object.to_string(),
                reason: err.to_string(),
            })
    }
}

#[async_trait]
impl Session for RestClient {
    async fn query(&self, soql: &str) -> Result<Value, TransportError> {
        self.get("query/", &[("q", soql)]).await
    }

    async fn reauthenticate(&self) -> Result<(), TransportError> {
        self.login().await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_string_contains;
    use wiremock::matchers::header;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::matchers::query_param;

    use super::*;

    fn config(server: &MockServer) -> ConnectionConfig {
        ConnectionConfig {
            login_url: Some(Url::parse(&server.uri()).unwrap()),
            client_id: "consumer-key".to_string(),
            client_secret: "consumer-secret".to_string(),
            username: "integration@example.com".to_string(),
            password: "hunter2".to_string(),
            security_token: Some("TOKEN".to_string()),
            ..Default::default()
        }
    }

    async fn mock_login(server: &MockServer, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("password=hunter2TOKEN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "instance_url": server.uri(),
                "token_type": "Bearer"
            })))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lists_and_describes_objects() {
        let server = MockServer::start().await;
        mock_login(&server, "first").await;
        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/sobjects/"))
            .and(header("authorization", "Bearer first"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "encoding": "UTF-8",
                "sobjects": [{ "name": "Account", "label": "Account" }, { "name": "Contact" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/sobjects/Account/describe/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Account",
                "label": "Account",
                "fields": [{ "name": "Id", "label": "Account ID", "type": "id", "nillable": false }],
                "childRelationships": []
            })))
            .mount(&server)
            .await;

        let client = RestClient::connect(config(&server)).await.unwrap();

        assert_eq!(client.list_objects().await.unwrap(), vec!["Account", "Contact"]);
        let account = client.describe("Account").await.unwrap();
        assert_eq!(account.fields.len(), 1);
    }

    #[tokio::test]
    async fn runs_queries_and_logs_in_again() {
        let server = MockServer::start().await;
        mock_login(&server, "first").await;
        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/query/"))
            .and(query_param("q", "SELECT Id FROM Account"))
            .and(header("authorization", "Bearer first"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!([{
                "message": "Session expired or invalid",
                "errorCode": "INVALID_SESSION_ID"
            }])))
            .mount(&server)
            .await;

        let client = RestClient::connect(config(&server)).await.unwrap();
        let err = client.query("SELECT Id FROM Account").await.unwrap_err();
        assert_eq!(
            err,
            TransportError::AuthExpired {
                message: "Session expired or invalid".to_string()
            }
        );

        mock_login(&server, "second").await;
        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/query/"))
            .and(header("authorization", "Bearer second"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalSize": 1,
                "done": true,
                "records": [{ "attributes": { "type": "Account" }, "Id": "001" }]
            })))
            .mount(&server)
            .await;

        client.reauthenticate().await.unwrap();
        let result = client.query("SELECT Id FROM Account").await.unwrap();
        assert_eq!(result["totalSize"], json!(1));
    }

    #[tokio::test]
    async fn reports_platform_errors() {
        let server = MockServer::start().await;
        mock_login(&server, "first").await;
        Mock::given(method("GET"))
            .and(path("/services/data/v59.0/query/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!([{
                "message": "unexpected token: FROM",
                "errorCode": "MALFORMED_QUERY"
            }])))
            .mount(&server)
            .await;

        let client = RestClient::connect(config(&server)).await.unwrap();
        let err = client.query("SELECT FROM Account").await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Query {
                error_code: "MALFORMED_QUERY".to_string(),
                message: "unexpected token: FROM".to_string()
            }
        );
    }

    #[tokio::test]
    async fn refused_logins_are_authentication_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "authentication failure"
            })))
            .mount(&server)
            .await;

        let err = RestClient::connect(config(&server)).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Authentication {
                message: "authentication failure".to_string()
            }
        );
    }

    #[tokio::test]
    async fn login_urls_with_a_path_keep_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/my-domain/services/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "first",
                "instance_url": server.uri(),
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = ConnectionConfig {
            login_url: Some(Url::parse(&format!("{}/my-domain", server.uri())).unwrap()),
            ..config(&server)
        };
        RestClient::connect(config).await.unwrap();
    }

    #[tokio::test]
    async fn queries_before_login_report_an_expired_session() {
        let client = RestClient::new(ConnectionConfig::default()).unwrap();
        let err = client.query("SELECT Id FROM Account").await.unwrap_err();
        assert!(err.is_auth_expired());
    }
}
