//! Core traits (interfaces) for the ScopeGraph gateway

pub mod graph_store;

pub use graph_store::GraphStore;

#[cfg(test)]
pub use graph_store::MockGraphStore;
