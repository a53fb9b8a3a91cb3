//! Correlation ids for one render request.
//!
//! A render opens the root span. Each store attempt and each mapped record
//! gets a child span under it, so log lines from the executor, the store
//! adapter and the mapper workers can be tied back to the request.

use std::fmt;

use uuid::Uuid;

/// Part of the render pipeline a span covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Render,
    /// One store round trip, numbered from 1.
    Attempt(u32),
    /// Mapping of one result record, numbered from 0.
    Record(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Render => write!(f, "render"),
            Stage::Attempt(n) => write!(f, "attempt-{}", n),
            Stage::Record(n) => write!(f, "record-{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub stage: Stage,
}

impl TraceContext {
    /// Opens the span of a new render request.
    pub fn new_root() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            parent_id: None,
            stage: Stage::Render,
        }
    }

    pub fn for_attempt(&self, attempt: u32) -> Self {
        self.child(Stage::Attempt(attempt))
    }

    pub fn for_record(&self, index: usize) -> Self {
        self.child(Stage::Record(index))
    }

    fn child(&self, stage: Stage) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_id: Some(self.span_id.clone()),
            stage,
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new_root()
    }
}
