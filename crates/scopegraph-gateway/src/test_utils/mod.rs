//! Test doubles and builders shared by unit and integration tests

pub mod builders;
pub mod fake_store;

pub use builders::{node, path, record, relationship, relationship_with_nodes};
pub use fake_store::{FakeGraphStore, StoreCall};
