//! ScopeGraph gateway
//!
//! Restricts read queries against a shared graph database to one tenant's
//! partition, runs them under the caller's identity and shapes the result rows
//! into a deduplicated node/relationship graph for visualization clients.

// Core modules
pub mod config;
pub mod data;
pub mod services;
pub mod traits;

// Store adapters behind the driver feature
#[cfg(feature = "neo4j")]
pub mod adapters;

// Testing utilities
pub mod test_utils;

// Re-export key types for convenient usage
pub use config::{
    GatewayConfig, MissingPartitionPolicy, Neo4jConfig, PartitionScheme, RetryPolicy,
    StyleConfig, UnscopedQueryPolicy,
};
pub use data::{
    CanonicalGraph, ConfigError, ErrorBody, ErrorCategory, ExecutorError, GatewayError,
    GraphElement, GraphValue, Identity, MappingError, NodeElement, Record, RelationshipElement,
    StoreError, TenantId, TraceContext,
};
pub use services::{
    GraphCollector, Gateway, QueryExecutor, RecordMapper, RewriteOutcome, ScopeRewriter,
    ScopedQuery,
};
pub use traits::GraphStore;

#[cfg(feature = "neo4j")]
pub use adapters::neo4j_store::Neo4jGraphStore;

/// Initialize tracing for the gateway
///
/// `RUST_LOG` selects the filter (default `info`); `LOG_FORMAT=json` switches
/// to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
