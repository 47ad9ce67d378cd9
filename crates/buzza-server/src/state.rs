//! Server state management.

use std::sync::Arc;
use std::time::{Duration, Instant};

use buzza_core::activity::{ActivityStore, SqliteActivityStore};
use buzza_core::config::BuzzaConfig;
use buzza_core::db;
use buzza_core::error::BuzzaResult;
use buzza_core::program::{ProgramStore, SqliteProgramStore};
use tracing::warn;

use crate::auth::{Authenticator, StaticTokenAuthenticator};
use crate::error::{ApiError, ApiResult};

/// Shared application state.
///
/// Everything here is read-only after startup; handlers clone the `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub programs: Arc<dyn ProgramStore>,
    pub activities: Arc<dyn ActivityStore>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Deadline applied to each store query.
    pub request_timeout: Duration,
}

impl AppState {
    /// Create state from explicit collaborators.
    pub fn new(
        programs: Arc<dyn ProgramStore>,
        activities: Arc<dyn ActivityStore>,
        authenticator: Arc<dyn Authenticator>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            programs,
            activities,
            authenticator,
            request_timeout,
        }
    }

    /// Open the SQLite stores and token table named by `config`.
    pub fn from_config(config: &BuzzaConfig) -> BuzzaResult<Self> {
        let programs = SqliteProgramStore::new(&config.database_path)?;
        let activities = SqliteActivityStore::new(&config.database_path)?;
        let authenticator = StaticTokenAuthenticator::new(config.api_tokens.clone());
        if authenticator.is_empty() {
            warn!("No API tokens configured; every /activities request will be rejected");
        }

        Ok(Self::new(
            Arc::new(programs),
            Arc::new(activities),
            Arc::new(authenticator),
            config.request_timeout(),
        ))
    }

    /// Run a program store query on the blocking pool under the request deadline.
    pub async fn query_programs<T, F>(&self, op: &'static str, f: F) -> ApiResult<T>
    where
        F: FnOnce(&dyn ProgramStore) -> BuzzaResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.programs.clone();
        run_with_deadline(self.request_timeout, op, move || f(store.as_ref())).await
    }

    /// Run an activity store query on the blocking pool under the request deadline.
    pub async fn query_activities<T, F>(&self, op: &'static str, f: F) -> ApiResult<T>
    where
        F: FnOnce(&dyn ActivityStore) -> BuzzaResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.activities.clone();
        run_with_deadline(self.request_timeout, op, move || f(store.as_ref())).await
    }
}

/// Store calls are synchronous; this keeps them off the async workers. The
/// deadline travels with the call, so only this call's statement is aborted
/// when it passes. No retries.
async fn run_with_deadline<T, F>(timeout: Duration, op: &'static str, query: F) -> ApiResult<T>
where
    F: FnOnce() -> BuzzaResult<T> + Send + 'static,
    T: Send + 'static,
{
    let deadline = Instant::now() + timeout;
    let task = tokio::task::spawn_blocking(move || db::with_deadline(deadline, query));

    match tokio::time::timeout_at(deadline.into(), task).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => {
            if err.is_interrupted() {
                warn!(
                    op,
                    code = err.code().as_str(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Store query aborted at deadline"
                );
            }
            Err(ApiError::from(err.context(op)))
        }
        Ok(Err(join_err)) => Err(ApiError::internal(format!(
            "{}: store task failed: {}",
            op, join_err
        ))),
        Err(_) => {
            warn!(op, timeout_ms = timeout.as_millis() as u64, "Store query deadline exceeded");
            Err(ApiError::internal(format!(
                "{}: deadline of {:?} exceeded",
                op, timeout
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use buzza_core::db::Database;
    use buzza_core::error::BuzzaError;

    const LONG_COUNT: &str = r#"
        WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 100000000)
        SELECT count(*) FROM c"#;

    fn count(db: &Database, sql: &'static str) -> BuzzaResult<i64> {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
    }

    #[tokio::test]
    async fn test_deadline_exceeded_is_500() {
        let result: ApiResult<()> = run_with_deadline(Duration::from_millis(20), "slow query", || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap_err().status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_deadline_aborts_running_statement() {
        let db = Arc::new(Database::in_memory().unwrap());
        let started = std::time::Instant::now();

        let store = db.clone();
        let result = run_with_deadline(Duration::from_millis(50), "long count", move || {
            count(&store, LONG_COUNT)
        })
        .await;
        assert_eq!(result.unwrap_err().status, StatusCode::INTERNAL_SERVER_ERROR);

        // The statement is aborted rather than left running on the connection.
        let store = db.clone();
        let after = tokio::task::spawn_blocking(move || store.ping()).await.unwrap();
        assert!(after.is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_their_own_deadline() {
        let db = Arc::new(Database::in_memory().unwrap());

        let store = db.clone();
        let patient = tokio::spawn(run_with_deadline(
            Duration::from_secs(30),
            "patient",
            move || {
                store.with_conn(|conn| {
                    std::thread::sleep(Duration::from_millis(200));
                    Ok(conn.query_row("SELECT 42", [], |row| row.get::<_, i64>(0))?)
                })
            },
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let store = db.clone();
        let hasty = run_with_deadline(Duration::from_millis(20), "hasty", move || store.ping()).await;

        assert_eq!(hasty.unwrap_err().status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(patient.await.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_interrupted_store_error_is_500() {
        let store = Database::in_memory().unwrap();

        // The inner scope expires first, so the store reports the interrupt itself.
        let result = run_with_deadline(Duration::from_secs(5), "expired inner call", move || {
            db::with_deadline(Instant::now(), || store.ping())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_store_error_kind_survives() {
        let result: ApiResult<()> = run_with_deadline(
            Duration::from_secs(1),
            "latest program files",
            || Err(BuzzaError::not_found("program")),
        )
        .await;

        assert_eq!(result.unwrap_err().status, StatusCode::NOT_FOUND);
    }
}
