//! Request execution against the live schema.

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;

use crate::configuration::SchemaConfig;
use crate::error::ErrorExtension;
use crate::error::RequestError;
use crate::execute::Session;
use crate::execute::execute_plan;
use crate::graphql;
use crate::query::QueryPlanner;
use crate::query::Selection;
use crate::query::TYPENAME;
use crate::query::parse_operation;
use crate::schema::LiveSchema;
use crate::schema::SObjectSchema;

/// Answers GraphQL requests with one SOQL query per root field.
#[derive(Clone)]
pub struct GraphQLService {
    schema: Arc<LiveSchema>,
    session: Arc<dyn Session>,
    planner: QueryPlanner,
}

impl GraphQLService {
    pub fn new(schema: Arc<LiveSchema>, session: Arc<dyn Session>, config: &SchemaConfig) -> Self {
        Self {
            schema,
            session,
            planner: QueryPlanner::new(config.max_parent_depth),
        }
    }

    /// Executes `request` against the schema loaded when the request starts.
    ///
    /// Root fields resolve concurrently. A root field that fails is `null` in the response and
    /// reported with its path; the other root fields are unaffected.
    #[tracing::instrument(skip_all, fields(operation_name = request.operation_name.as_deref()))]
    pub async fn execute(&self, request: graphql::Request) -> graphql::Response {
        let schema = self.schema.load();
        let roots = match parse_operation(&request.query, request.operation_name.as_deref()) {
            Ok(roots) => roots,
            Err(err) => {
                return graphql::Response::from_errors(vec![err.to_graphql_error(Vec::new())]);
            }
        };
        let roots: Vec<&Selection> = roots
            .iter()
            .filter(|root| {
                root.type_condition
                    .as_ref()
                    .is_none_or(|condition| condition.as_str() == schema.query_type_name())
            })
            .collect();

        let results = futures::future::join_all(
            roots.iter().map(|root| self.resolve_root(&schema, root)),
        )
        .await;

        let mut data = Map::with_capacity(roots.len());
        let mut errors = Vec::new();
        for (root, result) in roots.iter().zip(results) {
            let response_key = root.response_key.to_string();
            match result {
                Ok(value) => {
                    data.insert(response_key, value);
                }
                Err(err) => {
                    let path = match &err {
                        RequestError::UnknownField(unknown) => unknown.path.clone(),
                        _ => vec![response_key.clone()],
                    };
                    tracing::debug!(error = %err, "root field failed");
                    errors.push(err.to_graphql_error(path));
                    data.insert(response_key, Value::Null);
                }
            }
        }

        graphql::Response {
            data: Some(Value::Object(data)),
            errors,
        }
    }

    async fn resolve_root(
        &self,
        schema: &SObjectSchema,
        root: &Selection,
    ) -> Result<Value, RequestError> {
        if root.field_name.as_str() == TYPENAME {
            return Ok(Value::String(schema.query_type_name().to_string()));
        }
        let plan = self
            .planner
            .plan(schema.graph(), schema.query_type_name(), root)?;
        Ok(execute_plan(&plan, self.session.as_ref()).await?)
    }
}

impl std::fmt::Debug for GraphQLService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLService")
            .field("schema", &self.schema)
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::TransportError;
    use crate::metadata::FieldDescriptor;
    use crate::metadata::ObjectDescriptor;
    use crate::metadata::ScalarKind;

    /// Answers every query with the rows registered for its object.
    #[derive(Default)]
    struct FixedSession {
        rows: Vec<(&'static str, Value)>,
    }

    #[async_trait]
    impl Session for FixedSession {
        async fn query(&self, soql: &str) -> Result<Value, TransportError> {
            self.rows
                .iter()
                .find(|(object, _)| soql.ends_with(&format!("FROM {object}")))
                .map(|(_, records)| {
                    json!({ "totalSize": 1, "done": true, "records": records })
                })
                .ok_or_else(|| TransportError::Query {
                    error_code: "INVALID_TYPE".to_string(),
                    message: "sObject type is not supported".to_string(),
                })
        }

        async fn reauthenticate(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn service(session: FixedSession) -> GraphQLService {
        let config = SchemaConfig::default();
        let schema = SObjectSchema::from_descriptors(
            &[
                ObjectDescriptor::new("Account")
                    .with_field(FieldDescriptor::new("Id", ScalarKind::Id))
                    .with_field(FieldDescriptor::new("Name", ScalarKind::String)),
                ObjectDescriptor::new("Lead")
                    .with_field(FieldDescriptor::new("Id", ScalarKind::Id))
                    .with_field(FieldDescriptor::new("Company", ScalarKind::String)),
            ],
            &config,
        )
        .unwrap();
        GraphQLService::new(Arc::new(LiveSchema::new(schema)), Arc::new(session), &config)
    }

    #[tokio::test]
    async fn resolves_every_root_field() {
        let service = service(FixedSession {
            rows: vec![
                ("Account", json!([{ "attributes": { "type": "Account" }, "Id": "001", "Name": "Acme" }])),
                ("Lead", json!([{ "attributes": { "type": "Lead" }, "Id": "00Q", "Company": "Initech" }])),
            ],
        });

        let response = service
            .execute(graphql::Request::new(
                "{ __typename accounts: Account { Name } Lead { Company } }",
            ))
            .await;

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "data": {
                    "__typename": "Salesforce",
                    "accounts": [{ "Name": "Acme" }],
                    "Lead": [{ "Company": "Initech" }]
                }
            })
        );
    }

    #[tokio::test]
    async fn failing_root_fields_are_null_with_an_error() {
        let service = service(FixedSession {
            rows: vec![(
                "Account",
                json!([{ "attributes": { "type": "Account" }, "Id": "001", "Name": "Acme" }]),
            )],
        });

        let response = service
            .execute(graphql::Request::new(
                "{ Account { Name } Lead { Company } Contact { Name } }",
            ))
            .await;

        assert_eq!(
            response.data,
            Some(json!({ "Account": [{ "Name": "Acme" }], "Lead": null, "Contact": null }))
        );
        assert_eq!(response.errors.len(), 2);
        assert_eq!(response.errors[0].path, vec!["Lead"]);
        assert_eq!(
            response.errors[0].extensions.get("code"),
            Some(&json!("QUERY_EXECUTION_ERROR"))
        );
        assert_eq!(response.errors[1].path, vec!["Contact"]);
        assert_eq!(
            response.errors[1].message,
            "field 'Contact' does not exist on type 'Salesforce'"
        );
    }

    #[tokio::test]
    async fn invalid_documents_have_no_data() {
        let service = service(FixedSession::default());

        let response = service
            .execute(graphql::Request::new("mutation { Account { Id } }"))
            .await;

        assert!(response.data.is_none());
        assert_eq!(
            response.errors[0].extensions.get("code"),
            Some(&json!("OPERATION_NOT_SUPPORTED"))
        );
    }
}
