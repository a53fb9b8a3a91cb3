use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::data::{Identity, Record, StoreError, TraceContext};
use crate::traits::GraphStore;

/// One call observed by the fake store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Run { identity: String, query: String },
    PartitionLabels,
}

/// In-memory GraphStore with scripted responses.
///
/// Responses to `run` are consumed in order; once the script is empty every
/// further call returns no rows.
#[derive(Debug, Default)]
pub struct FakeGraphStore {
    responses: Mutex<VecDeque<Result<Vec<Record>, StoreError>>>,
    labels: Mutex<Vec<String>>,
    calls: Mutex<Vec<StoreCall>>,
}

impl FakeGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues rows for the next `run` call.
    pub fn push_records(&self, records: Vec<Record>) -> &Self {
        self.responses.lock().push_back(Ok(records));
        self
    }

    /// Queues a failure for the next `run` call.
    pub fn push_error(&self, error: StoreError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub fn set_labels(&self, labels: &[&str]) {
        *self.labels.lock() = labels.iter().map(|l| l.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Queries passed to `run`, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                StoreCall::Run { query, .. } => Some(query.clone()),
                StoreCall::PartitionLabels => None,
            })
            .collect()
    }
}

#[async_trait]
impl GraphStore for FakeGraphStore {
    async fn run(
        &self,
        identity: &Identity,
        trace_ctx: &TraceContext,
        query: &str,
    ) -> Result<Vec<Record>, StoreError> {
        debug!(trace_id = %trace_ctx.trace_id, stage = %trace_ctx.stage, query, "FakeGraphStore run");
        self.calls.lock().push(StoreCall::Run {
            identity: identity.as_str().to_string(),
            query: query.to_string(),
        });
        self.responses.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn partition_labels(&self, _trace_ctx: &TraceContext) -> Result<Vec<String>, StoreError> {
        self.calls.lock().push(StoreCall::PartitionLabels);
        Ok(self.labels.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{node, record};
    use crate::data::GraphValue;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let store = FakeGraphStore::new();
        store
            .push_error(StoreError::SessionExpired("gone".into()))
            .push_records(vec![record(vec![(
                "n",
                GraphValue::Node(node("n1", &["CVE"], &[])),
            )])]);

        let identity = Identity::new("alice");
        let ctx = TraceContext::new_root();
        assert!(store.run(&identity, &ctx, "q1").await.is_err());
        assert_eq!(store.run(&identity, &ctx, "q2").await.unwrap().len(), 1);
        assert!(store.run(&identity, &ctx, "q3").await.unwrap().is_empty());
        assert_eq!(store.queries(), vec!["q1", "q2", "q3"]);
    }
}
