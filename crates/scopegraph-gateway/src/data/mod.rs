//! Core data structures for the ScopeGraph gateway

pub mod elements;
pub mod errors;
pub mod identifiers;
pub mod trace_context;
pub mod values;

// Re-export all common types
pub use elements::{
    CanonicalGraph, Caption, GraphElement, NodeElement, PathElement, RelationshipElement,
};
pub use errors::{
    ConfigError, ErrorBody, ErrorCategory, ExecutorError, GatewayError, MappingError, StoreError,
};
pub use identifiers::{Identity, TenantId};
pub use trace_context::{Stage, TraceContext};
pub use values::{
    Endpoints, GraphValue, Properties, PropertyValue, RawNode, RawPath, RawRelationship, Record,
    Temporal,
};
