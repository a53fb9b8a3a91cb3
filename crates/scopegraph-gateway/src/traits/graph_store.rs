//! GraphStore trait definition for graph database interaction

use async_trait::async_trait;

use crate::data::{Identity, Record, StoreError, TraceContext};

/// Port to the shared graph database.
///
/// Constructed once at startup and injected into the executor, so tests can
/// substitute an in-memory implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Runs a read query in a fresh session on behalf of `identity`.
    ///
    /// Implementations impersonate `identity` where the driver supports it;
    /// otherwise the query runs under the store account and `identity` is
    /// only recorded for audit. Every call opens its own session and no state
    /// is carried over between calls. Rows come back in store order.
    async fn run(
        &self,
        identity: &Identity,
        trace_ctx: &TraceContext,
        query: &str,
    ) -> Result<Vec<Record>, StoreError>;

    /// Lists every node label present in the store.
    ///
    /// Privileged catalog call made with the gateway's own credentials, never
    /// impersonated.
    async fn partition_labels(&self, trace_ctx: &TraceContext) -> Result<Vec<String>, StoreError>;
}
