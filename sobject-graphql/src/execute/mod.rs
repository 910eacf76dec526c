//! Running compiled queries over a session.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::QueryExecutionError;
use crate::error::TransportError;
use crate::query::QueryPlan;

mod normalize;
mod shape;

/// An authenticated connection to the organization.
#[async_trait]
pub trait Session: Send + Sync {
    /// Runs one SOQL query and returns the raw result, `{totalSize, done, records}`.
    ///
    /// An expired session is reported as [`TransportError::AuthExpired`].
    async fn query(&self, soql: &str) -> Result<Value, TransportError>;

    /// Logs in again, replacing the current session.
    async fn reauthenticate(&self) -> Result<(), TransportError>;
}

/// Runs `soql` and returns its normalized records.
///
/// When the session has expired, re-authenticates once and retries the query once. Every
/// other failure, including a second expiry, is returned as is.
#[tracing::instrument(skip_all)]
pub async fn execute<S>(soql: &str, session: &S) -> Result<Vec<Value>, QueryExecutionError>
where
    S: Session + ?Sized,
{
    let result = match session.query(soql).await {
        Err(err) if err.is_auth_expired() => {
            tracing::warn!(error = %err, "session expired, re-authenticating");
            session.reauthenticate().await.map_err(QueryExecutionError)?;
            session.query(soql).await.map_err(QueryExecutionError)?
        }
        result => result.map_err(QueryExecutionError)?,
    };

    normalize::records(result).map_err(QueryExecutionError)
}

/// Executes `plan` and shapes its records after the planned selections.
pub async fn execute_plan<S>(plan: &QueryPlan, session: &S) -> Result<Value, QueryExecutionError>
where
    S: Session + ?Sized,
{
    let records = execute(&plan.soql, session).await?;
    Ok(shape::records(&records, &plan.object, &plan.selections))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    /// Answers queries from a script, one entry per call.
    #[derive(Default)]
    struct ScriptedSession {
        answers: Mutex<VecDeque<Result<Value, TransportError>>>,
        queries: Mutex<Vec<String>>,
        logins: AtomicUsize,
        login_error: Option<TransportError>,
    }

    impl ScriptedSession {
        fn new(answers: impl IntoIterator<Item = Result<Value, TransportError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().collect()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Session for ScriptedSession {
        async fn query(&self, soql: &str) -> Result<Value, TransportError> {
            self.queries.lock().push(soql.to_string());
            self.answers
                .lock()
                .pop_front()
                .expect("no answer left in the script")
        }

        async fn reauthenticate(&self) -> Result<(), TransportError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            match &self.login_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn expired() -> TransportError {
        TransportError::AuthExpired {
            message: "Session expired or invalid".to_string(),
        }
    }

    fn one_row() -> Value {
        json!({
            "totalSize": 1,
            "done": true,
            "records": [{ "attributes": { "type": "Account" }, "Id": "001" }]
        })
    }

    #[tokio::test]
    async fn retries_once_after_reauthenticating() {
        let session = ScriptedSession::new([Err(expired()), Ok(one_row())]);

        let rows = execute("SELECT Id FROM Account", &session).await.unwrap();

        assert_eq!(rows, vec![json!({ "__typename": "Account", "Id": "001" })]);
        assert_eq!(session.logins.load(Ordering::SeqCst), 1);
        assert_eq!(
            *session.queries.lock(),
            vec!["SELECT Id FROM Account", "SELECT Id FROM Account"]
        );
    }

    #[tokio::test]
    async fn a_second_expiry_is_an_execution_error() {
        let session = ScriptedSession::new([Err(expired()), Err(expired())]);

        let err = execute("SELECT Id FROM Account", &session).await.unwrap_err();

        assert_eq!(err, QueryExecutionError(expired()));
        assert_eq!(session.logins.load(Ordering::SeqCst), 1);
        assert_eq!(session.queries.lock().len(), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let malformed = TransportError::Query {
            error_code: "MALFORMED_QUERY".to_string(),
            message: "unexpected token: FROM".to_string(),
        };
        let session = ScriptedSession::new([Err(malformed.clone())]);

        let err = execute("SELECT FROM Account", &session).await.unwrap_err();

        assert_eq!(err, QueryExecutionError(malformed));
        assert_eq!(session.logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_reauthentication_is_returned() {
        let refused = TransportError::Authentication {
            message: "invalid_grant".to_string(),
        };
        let session = ScriptedSession {
            login_error: Some(refused.clone()),
            ..ScriptedSession::new([Err(expired())])
        };

        let err = execute("SELECT Id FROM Account", &session).await.unwrap_err();

        assert_eq!(err, QueryExecutionError(refused));
        assert_eq!(session.queries.lock().len(), 1);
    }
}
