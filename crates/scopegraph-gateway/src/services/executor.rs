use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::config::RetryPolicy;
use crate::data::{ExecutorError, Identity, Record, StoreError, TraceContext};
use crate::traits::GraphStore;

/// Runs scoped queries against the graph store, retrying transient faults.
pub struct QueryExecutor {
    store: Arc<dyn GraphStore>,
    policy: RetryPolicy,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn GraphStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Executes `query` under `identity`, one fresh session per attempt.
    ///
    /// Retryable faults are retried after the fixed delay until
    /// `max_attempts` is reached; any other fault is returned at once.
    #[instrument(skip(self, query), fields(identity = %identity, trace_id = %trace_ctx.trace_id))]
    pub async fn execute(
        &self,
        identity: &Identity,
        trace_ctx: &TraceContext,
        query: &str,
    ) -> Result<Vec<Record>, ExecutorError> {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, "Running query");

            let attempt_ctx = trace_ctx.for_attempt(attempt);
            let error = match self.store.run(identity, &attempt_ctx, query).await {
                Ok(records) => {
                    info!(
                        attempt,
                        rows = records.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Query completed"
                    );
                    return Ok(records);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                warn!(attempt, error = %error, "Query failed with a non-retryable error");
                return Err(ExecutorError::Fatal(error));
            }

            if attempt >= max_attempts {
                warn!(
                    attempts = attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %error,
                    "Graph store unavailable, giving up"
                );
                return Err(ExecutorError::Unavailable {
                    attempts: attempt,
                    last: error,
                });
            }

            warn!(
                attempt,
                max_attempts,
                delay_ms = self.policy.delay.as_millis() as u64,
                error = %error,
                "Transient store error, retrying"
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    /// Whether `label` is present in the store's label catalog.
    ///
    /// Runs with the gateway's own credentials.
    #[instrument(skip(self), fields(trace_id = %trace_ctx.trace_id))]
    pub async fn partition_exists(
        &self,
        trace_ctx: &TraceContext,
        label: &str,
    ) -> Result<bool, StoreError> {
        let labels = self.store.partition_labels(trace_ctx).await?;
        let exists = labels.iter().any(|existing| existing == label);
        debug!(label, exists, "Checked partition label catalog");
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Stage;
    use crate::traits::MockGraphStore;
    use indexmap::IndexMap;
    use mockall::Sequence;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }

    fn one_row() -> Vec<Record> {
        vec![IndexMap::new()]
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let mut store = MockGraphStore::new();
        let mut seq = Sequence::new();
        store
            .expect_run()
            .times(2)
            .in_sequence(&mut seq)
            .withf(|_, ctx, _| matches!(ctx.stage, Stage::Attempt(1 | 2)))
            .returning(|_, _, _| Err(StoreError::SessionExpired("expired".into())));
        store
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, ctx, _| ctx.stage == Stage::Attempt(3))
            .returning(|_, _, _| Ok(one_row()));

        let executor = QueryExecutor::new(Arc::new(store), policy());
        let started = tokio::time::Instant::now();
        let records = executor
            .execute(&Identity::new("alice"), &TraceContext::new_root(), "MATCH (n) RETURN n")
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let mut store = MockGraphStore::new();
        store
            .expect_run()
            .times(3)
            .returning(|_, _, _| Err(StoreError::ServiceUnavailable("down".into())));

        let executor = QueryExecutor::new(Arc::new(store), policy());
        let result = executor
            .execute(&Identity::new("alice"), &TraceContext::new_root(), "MATCH (n) RETURN n")
            .await;

        assert_eq!(
            result.unwrap_err(),
            ExecutorError::Unavailable {
                attempts: 3,
                last: StoreError::ServiceUnavailable("down".into()),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let mut store = MockGraphStore::new();
        store
            .expect_run()
            .times(1)
            .returning(|_, _, _| Err(StoreError::Syntax("Invalid input 'MATC'".into())));

        let executor = QueryExecutor::new(Arc::new(store), policy());
        let result = executor
            .execute(&Identity::new("alice"), &TraceContext::new_root(), "MATC (n) RETURN n")
            .await;

        assert_eq!(
            result.unwrap_err(),
            ExecutorError::Fatal(StoreError::Syntax("Invalid input 'MATC'".into()))
        );
    }

    #[tokio::test]
    async fn test_runs_under_the_given_identity() {
        let mut store = MockGraphStore::new();
        store
            .expect_run()
            .withf(|identity, _, query| identity.as_str() == "bob" && query.contains("t7"))
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let executor = QueryExecutor::new(Arc::new(store), policy());
        let records = executor
            .execute(
                &Identity::new("bob"),
                &TraceContext::new_root(),
                "MATCH (n) WHERE (n:t7 OR n:Global) RETURN n",
            )
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_partition_exists_checks_catalog() {
        let mut store = MockGraphStore::new();
        store
            .expect_partition_labels()
            .times(2)
            .returning(|_| Ok(vec!["CVE".to_string(), "t7".to_string(), "Global".to_string()]));

        let executor = QueryExecutor::new(Arc::new(store), policy());
        let ctx = TraceContext::new_root();
        assert!(executor.partition_exists(&ctx, "t7").await.unwrap());
        assert!(!executor.partition_exists(&ctx, "t8").await.unwrap());
    }
}
