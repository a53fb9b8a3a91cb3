//! Core services of the gateway: one module per stage of a render request

pub mod collector;
pub mod executor;
pub mod gateway;
pub mod mapper;
pub mod rewriter;

pub use collector::{Admission, GraphCollector};
pub use executor::QueryExecutor;
pub use gateway::Gateway;
pub use mapper::RecordMapper;
pub use rewriter::{RewriteOutcome, ScopeRewriter, ScopedQuery, SkipReason};
