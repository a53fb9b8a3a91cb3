//! Graph collector: flattens mapped elements into one deduplicated,
//! budget-bounded graph.

use indexmap::IndexMap;
use tracing::debug;

use crate::config::DEFAULT_ELEMENT_BUDGET;
use crate::data::{CanonicalGraph, GraphElement, NodeElement, RelationshipElement};

/// Whether the collector can take more elements after an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Continue,
    Exhausted,
}

/// Accumulates elements record by record.
///
/// Every flattened element counts against the budget when it is offered,
/// duplicates included. The first element seen for an id is kept.
#[derive(Debug)]
pub struct GraphCollector {
    budget: usize,
    admitted: usize,
    nodes: IndexMap<String, NodeElement>,
    relationships: IndexMap<String, RelationshipElement>,
}

impl GraphCollector {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            admitted: 0,
            nodes: IndexMap::new(),
            relationships: IndexMap::new(),
        }
    }

    pub fn admitted(&self) -> usize {
        self.admitted
    }

    pub fn is_exhausted(&self) -> bool {
        self.admitted >= self.budget
    }

    /// Admits the elements of one record, in mapper order, until the budget runs out.
    pub fn admit(&mut self, elements: Vec<GraphElement>) -> Admission {
        for element in elements {
            match element {
                GraphElement::Node(node) => self.admit_node(node),
                GraphElement::Relationship(rel) => self.admit_relationship(rel),
                GraphElement::Path(path) => {
                    for node in path.nodes {
                        self.admit_node(node);
                    }
                    for rel in path.relationships {
                        self.admit_relationship(rel);
                    }
                }
            }
            if self.is_exhausted() {
                break;
            }
        }

        if self.is_exhausted() {
            debug!(budget = self.budget, "Element budget reached");
            Admission::Exhausted
        } else {
            Admission::Continue
        }
    }

    fn admit_node(&mut self, node: NodeElement) {
        if self.is_exhausted() {
            return;
        }
        self.admitted += 1;
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    fn admit_relationship(&mut self, rel: RelationshipElement) {
        if self.is_exhausted() {
            return;
        }
        self.admitted += 1;
        self.relationships.entry(rel.id.clone()).or_insert(rel);
    }

    pub fn finish(self) -> CanonicalGraph {
        CanonicalGraph {
            nodes: self.nodes.into_values().collect(),
            relationships: self.relationships.into_values().collect(),
        }
    }
}

impl Default for GraphCollector {
    fn default() -> Self {
        Self::new(DEFAULT_ELEMENT_BUDGET)
    }
}
