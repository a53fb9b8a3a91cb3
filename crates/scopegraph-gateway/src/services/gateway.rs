use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{GatewayConfig, MissingPartitionPolicy, UnscopedQueryPolicy};
use crate::data::{
    CanonicalGraph, ConfigError, GatewayError, Identity, Record, TenantId, TraceContext,
};
use crate::services::collector::{Admission, GraphCollector};
use crate::services::executor::QueryExecutor;
use crate::services::mapper::RecordMapper;
use crate::services::rewriter::{RewriteOutcome, ScopeRewriter};
use crate::traits::GraphStore;

/// Entry point of the gateway: scope, execute, map and collect one query.
pub struct Gateway {
    rewriter: ScopeRewriter,
    executor: QueryExecutor,
    mapper: RecordMapper,
    element_budget: usize,
    unscoped_query_policy: UnscopedQueryPolicy,
    missing_partition_policy: MissingPartitionPolicy,
}

impl Gateway {
    pub fn new(
        rewriter: ScopeRewriter,
        executor: QueryExecutor,
        mapper: RecordMapper,
        element_budget: usize,
    ) -> Self {
        Self {
            rewriter,
            executor,
            mapper,
            element_budget,
            unscoped_query_policy: UnscopedQueryPolicy::default(),
            missing_partition_policy: MissingPartitionPolicy::default(),
        }
    }

    pub fn with_unscoped_query_policy(mut self, policy: UnscopedQueryPolicy) -> Self {
        self.unscoped_query_policy = policy;
        self
    }

    pub fn with_missing_partition_policy(mut self, policy: MissingPartitionPolicy) -> Self {
        self.missing_partition_policy = policy;
        self
    }

    /// Builds a gateway from loaded configuration around an existing store handle.
    pub fn from_config(
        config: &GatewayConfig,
        store: Arc<dyn GraphStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let scheme = config.partition_scheme()?;
        let styles = Arc::new(config.load_styles()?);

        let gateway = Self::new(
            ScopeRewriter::new(scheme.clone()),
            QueryExecutor::new(store, config.retry_policy()),
            RecordMapper::new(styles, scheme, config.mapper_workers),
            config.element_budget,
        )
        .with_unscoped_query_policy(config.unscoped_query_policy)
        .with_missing_partition_policy(config.missing_partition_policy);
        Ok(gateway)
    }

    /// Renders `raw_query` for `tenant_id` as a canonical graph.
    ///
    /// The query runs under `identity`. Records after the one that exhausts
    /// the element budget are never mapped.
    #[instrument(
        skip(self, raw_query),
        fields(tenant_id = %tenant_id, identity = %identity, trace_id = tracing::field::Empty)
    )]
    pub async fn render(
        &self,
        raw_query: &str,
        tenant_id: &TenantId,
        identity: &Identity,
    ) -> Result<CanonicalGraph, GatewayError> {
        let trace_ctx = TraceContext::new_root();
        tracing::Span::current().record("trace_id", trace_ctx.trace_id.as_str());

        self.validate_input(raw_query, tenant_id, identity)?;
        let query = self.scoped_query(raw_query, tenant_id, &trace_ctx).await?;

        let records = self.executor.execute(identity, &trace_ctx, &query).await?;
        let total_records = records.len();

        let (graph, visited) = self.collect(records, &trace_ctx).await;
        if visited < total_records {
            info!(
                visited,
                total_records,
                budget = self.element_budget,
                "Element budget reached, remaining records skipped"
            );
        }

        info!(
            nodes = graph.nodes.len(),
            relationships = graph.relationships.len(),
            "Rendered graph"
        );
        Ok(graph)
    }

    /// Maps and admits records in order until the budget is exhausted.
    ///
    /// Returns the graph and the number of records that were mapped.
    async fn collect(
        &self,
        records: Vec<Record>,
        trace_ctx: &TraceContext,
    ) -> (CanonicalGraph, usize) {
        let mut collector = GraphCollector::new(self.element_budget);
        let mut visited = 0;
        for record in records {
            if collector.is_exhausted() {
                break;
            }
            let record_ctx = trace_ctx.for_record(visited);
            visited += 1;
            let elements = self.mapper.map_record(record, &record_ctx).await;
            if collector.admit(elements) == Admission::Exhausted {
                break;
            }
        }
        (collector.finish(), visited)
    }

    fn validate_input(
        &self,
        raw_query: &str,
        tenant_id: &TenantId,
        identity: &Identity,
    ) -> Result<(), GatewayError> {
        if raw_query.trim().is_empty() {
            return Err(GatewayError::InvalidInput("query must not be empty".into()));
        }
        if tenant_id.is_blank() {
            return Err(GatewayError::InvalidInput("tenant id must not be empty".into()));
        }
        if identity.is_blank() {
            return Err(GatewayError::InvalidInput("identity must not be empty".into()));
        }
        if !self.rewriter.scheme().is_valid_tenant(tenant_id) {
            return Err(GatewayError::InvalidInput(format!(
                "tenant id '{}' does not match the configured pattern",
                tenant_id
            )));
        }
        Ok(())
    }

    /// Applies the access scope, honouring both policies.
    async fn scoped_query(
        &self,
        raw_query: &str,
        tenant_id: &TenantId,
        trace_ctx: &TraceContext,
    ) -> Result<String, GatewayError> {
        if self.missing_partition_policy == MissingPartitionPolicy::SkipScoping {
            let label = self.rewriter.scheme().partition_label(tenant_id);
            let exists = self
                .executor
                .partition_exists(trace_ctx, &label)
                .await
                .map_err(GatewayError::Store)?;
            if !exists {
                warn!(label = %label, "Partition label not found, running query unscoped");
                return Ok(raw_query.to_string());
            }
        }

        let scoped = self.rewriter.rewrite(raw_query, tenant_id);
        match scoped.outcome {
            RewriteOutcome::Scoped | RewriteOutcome::AlreadyScoped => Ok(scoped.text),
            RewriteOutcome::Skipped(reason) => match self.unscoped_query_policy {
                UnscopedQueryPolicy::PassThrough => {
                    warn!(reason = ?reason, "Query could not be scoped, running it unchanged");
                    Ok(scoped.text)
                }
                UnscopedQueryPolicy::Reject => {
                    warn!(reason = ?reason, "Rejecting query that could not be scoped");
                    Err(GatewayError::UnscopedQuery(format!(
                        "query cannot be restricted to tenant '{}' ({:?})",
                        tenant_id, reason
                    )))
                }
            },
        }
    }
}
