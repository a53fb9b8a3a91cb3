//! Record mapper: turns raw result columns into canonical graph elements.
//!
//! Columns of one record are mapped concurrently on a bounded set of tokio
//! tasks. A column that fails (or whose task panics) is logged and dropped;
//! the other columns of the record still come through.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::config::{PartitionScheme, StyleConfig, DEFAULT_MAPPER_WORKERS};
use crate::config::styles::MISSING_CAPTION;
use crate::data::{
    Caption, GraphElement, GraphValue, MappingError, NodeElement, PathElement, Properties,
    RawNode, RawPath, RawRelationship, Record, RelationshipElement, TraceContext,
};

/// Output keys that a domain property may never shadow.
const STRUCTURAL_KEYS: &[&str] = &[
    "id",
    "type",
    "captions",
    "size",
    "color",
    "labels",
    "relationshipType",
    "from",
    "to",
];

/// Property used as node caption when present.
const CAPTION_PROPERTY: &str = "classification";

/// True for keys that must not be copied into element properties.
pub fn is_excluded_property(key: &str) -> bool {
    if STRUCTURAL_KEYS.contains(&key) {
        return true;
    }
    let lower = key.to_ascii_lowercase();
    lower == "embeddings" || lower == "vector" || lower.ends_with("embedding")
}

fn filter_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(key, _)| !is_excluded_property(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Stateless shaping rules shared by every worker task.
#[derive(Debug)]
struct ElementShaper {
    styles: Arc<StyleConfig>,
    scheme: PartitionScheme,
}

impl ElementShaper {
    fn map_value(
        &self,
        column: &str,
        value: &GraphValue,
    ) -> Result<Option<GraphElement>, MappingError> {
        match value {
            GraphValue::Null | GraphValue::Scalar(_) => Ok(None),
            GraphValue::Node(node) => Ok(Some(GraphElement::Node(self.map_node(column, node)?))),
            GraphValue::Relationship(rel) => Ok(Some(GraphElement::Relationship(
                self.map_relationship(column, rel)?,
            ))),
            GraphValue::Path(path) => Ok(Some(GraphElement::Path(self.map_path(column, path)?))),
        }
    }

    fn primary_label<'a>(&self, node: &'a RawNode) -> Option<&'a str> {
        node.labels
            .iter()
            .map(String::as_str)
            .find(|label| !self.scheme.is_marker_label(label))
    }

    fn map_node(&self, column: &str, node: &RawNode) -> Result<NodeElement, MappingError> {
        if node.id.is_empty() {
            return Err(MappingError::MissingId {
                column: column.to_string(),
            });
        }

        let primary = self.primary_label(node);
        let style = self.styles.node_style(primary);
        let caption = node
            .properties
            .get(CAPTION_PROPERTY)
            .and_then(|value| value.display_text())
            .or_else(|| primary.map(str::to_string))
            .unwrap_or_else(|| MISSING_CAPTION.to_string());

        Ok(NodeElement {
            id: node.id.clone(),
            captions: vec![Caption {
                value: caption,
                styles: style.styles,
            }],
            size: style.size,
            color: style.color,
            labels: node.labels.clone(),
            properties: filter_properties(&node.properties),
        })
    }

    fn map_relationship(
        &self,
        column: &str,
        rel: &RawRelationship,
    ) -> Result<RelationshipElement, MappingError> {
        let from = rel.endpoints.start_id();
        let to = rel.endpoints.end_id();
        if rel.id.is_empty() || from.is_empty() || to.is_empty() {
            return Err(MappingError::MissingId {
                column: column.to_string(),
            });
        }

        let style = self.styles.relationship_style(&rel.rel_type);
        Ok(RelationshipElement {
            id: rel.id.clone(),
            relationship_type: rel.rel_type.clone(),
            from: from.to_string(),
            to: to.to_string(),
            captions: vec![Caption {
                value: style.caption,
                styles: style.styles,
            }],
            color: style.color,
            properties: filter_properties(&rel.properties),
        })
    }

    fn map_path(&self, column: &str, path: &RawPath) -> Result<PathElement, MappingError> {
        if path.nodes.len() != path.relationships.len() + 1 {
            return Err(MappingError::MalformedPath {
                column: column.to_string(),
                nodes: path.nodes.len(),
                relationships: path.relationships.len(),
            });
        }

        let nodes = path
            .nodes
            .iter()
            .map(|node| self.map_node(column, node))
            .collect::<Result<Vec<_>, _>>()?;
        let relationships = path
            .relationships
            .iter()
            .map(|rel| self.map_relationship(column, rel))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PathElement {
            nodes,
            relationships,
        })
    }
}

/// Maps raw records into graph elements using the shared style table.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    shaper: Arc<ElementShaper>,
    workers: usize,
}

impl RecordMapper {
    pub fn new(styles: Arc<StyleConfig>, scheme: PartitionScheme, workers: usize) -> Self {
        Self {
            shaper: Arc::new(ElementShaper { styles, scheme }),
            workers: workers.max(1),
        }
    }

    /// Maps a single column value without spawning.
    pub fn map_value(
        &self,
        column: &str,
        value: &GraphValue,
    ) -> Result<Option<GraphElement>, MappingError> {
        self.shaper.map_value(column, value)
    }

    /// Maps every column of `record`.
    ///
    /// Elements come back in column order. Failed columns contribute nothing.
    pub async fn map_record(&self, record: Record, trace_ctx: &TraceContext) -> Vec<GraphElement> {
        let shaper = Arc::clone(&self.shaper);
        map_columns(record, self.workers, trace_ctx, move |column, value| {
            shaper.map_value(column, value)
        })
        .await
    }
}

/// Runs `shape` over each column on its own task, at most `workers` at a time.
async fn map_columns<F>(
    record: Record,
    workers: usize,
    trace_ctx: &TraceContext,
    shape: F,
) -> Vec<GraphElement>
where
    F: Fn(&str, &GraphValue) -> Result<Option<GraphElement>, MappingError> + Send + Sync + 'static,
{
    let shape = Arc::new(shape);
    let permits = Arc::new(Semaphore::new(workers));
    let mut handles = Vec::with_capacity(record.len());

    for (column, value) in record {
        let shape = Arc::clone(&shape);
        let permits = Arc::clone(&permits);
        let task_column = column.clone();
        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|e| MappingError::Worker {
                column: task_column.clone(),
                reason: e.to_string(),
            })?;
            shape(&task_column, &value)
        });
        handles.push((column, handle));
    }

    let mut elements = Vec::with_capacity(handles.len());
    for (column, handle) in handles {
        match handle.await {
            Ok(Ok(Some(element))) => elements.push(element),
            Ok(Ok(None)) => debug!(column = %column, "Column holds no graph element"),
            Ok(Err(e)) => warn!(
                trace_id = %trace_ctx.trace_id,
                stage = %trace_ctx.stage,
                column = %column,
                error = %e,
                "Dropping column that could not be mapped"
            ),
            Err(join_error) => {
                let e = MappingError::Worker {
                    column: column.clone(),
                    reason: join_error.to_string(),
                };
                error!(
                    trace_id = %trace_ctx.trace_id,
                    stage = %trace_ctx.stage,
                    column = %column,
                    error = %e,
                    "Mapping worker aborted"
                );
            }
        }
    }
    elements
}

impl Default for RecordMapper {
    fn default() -> Self {
        Self::new(
            Arc::new(StyleConfig::builtin()),
            PartitionScheme::default(),
            DEFAULT_MAPPER_WORKERS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Endpoints, PropertyValue};
    use crate::test_utils::{node, path, record, relationship, relationship_with_nodes};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn mapper() -> RecordMapper {
        RecordMapper::default()
    }

    fn as_node(element: Option<GraphElement>) -> NodeElement {
        match element {
            Some(GraphElement::Node(node)) => node,
            other => panic!("expected node, got {:?}", other),
        }
    }

    fn as_relationship(element: Option<GraphElement>) -> RelationshipElement {
        match element {
            Some(GraphElement::Relationship(rel)) => rel,
            other => panic!("expected relationship, got {:?}", other),
        }
    }

    #[test]
    fn test_marker_label_is_not_primary() {
        let raw = node("n1", &["t7", "CVE"], &[("name", "CVE-2024-1".into())]);
        let mapped = as_node(mapper().map_value("n", &GraphValue::Node(raw)).unwrap());

        assert_eq!(mapped.captions[0].value, "CVE");
        assert_eq!(mapped.size, 25);
        assert_eq!(mapped.color, "yellow");
        assert_eq!(mapped.labels, vec!["t7".to_string(), "CVE".to_string()]);
    }

    #[test]
    fn test_classification_wins_over_label() {
        let raw = node("n1", &["CVE"], &[("classification", "critical".into())]);
        let mapped = as_node(mapper().map_value("n", &GraphValue::Node(raw)).unwrap());

        assert_eq!(mapped.captions[0].value, "critical");
        assert_eq!(mapped.captions[0].styles, vec!["bold".to_string()]);
        assert_eq!(
            mapped.properties.get("classification"),
            Some(&PropertyValue::from("critical"))
        );
    }

    #[test]
    fn test_unstyled_and_unlabeled_nodes_use_defaults() {
        let unknown = as_node(
            mapper()
                .map_value("n", &GraphValue::Node(node("n1", &["Host"], &[])))
                .unwrap(),
        );
        assert_eq!(unknown.captions[0].value, "Host");
        assert_eq!(unknown.size, 30);
        assert_eq!(unknown.color, "gray");

        let markers_only = as_node(
            mapper()
                .map_value("n", &GraphValue::Node(node("n2", &["t7", "Global"], &[])))
                .unwrap(),
        );
        assert_eq!(markers_only.captions[0].value, "missing caption");
    }

    #[test]
    fn test_excluded_properties_are_dropped_in_order() {
        let raw = node(
            "n1",
            &["Group"],
            &[
                ("name", "ops".into()),
                ("id", "shadow".into()),
                ("textEmbedding", PropertyValue::List(vec![0.1.into()])),
                ("vector", PropertyValue::List(vec![0.2.into()])),
                ("color", "pink".into()),
                ("owner", "bob".into()),
            ],
        );
        let mapped = as_node(mapper().map_value("n", &GraphValue::Node(raw)).unwrap());

        let keys: Vec<&str> = mapped.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "owner"]);
        assert_eq!(mapped.id, "n1");
        assert_eq!(mapped.color, "red");
    }

    #[test]
    fn test_relationship_endpoint_shapes_normalise() {
        let a = node("a", &["CVE"], &[]);
        let b = node("b", &["Group"], &[]);

        let with_nodes = as_relationship(
            mapper()
                .map_value(
                    "r",
                    &GraphValue::Relationship(relationship_with_nodes("r1", "MENTIONS", a, b)),
                )
                .unwrap(),
        );
        let with_ids = as_relationship(
            mapper()
                .map_value("r", &GraphValue::Relationship(relationship("r1", "MENTIONS", "a", "b")))
                .unwrap(),
        );

        assert_eq!(with_nodes, with_ids);
        assert_eq!(with_ids.from, "a");
        assert_eq!(with_ids.to, "b");
        assert_eq!(with_ids.captions[0].value, "MENTIONS");
        assert!(with_ids.captions[0].styles.is_empty());
        assert_eq!(with_ids.color, "black");
    }

    #[test]
    fn test_unknown_relationship_type_defaults() {
        let mapped = as_relationship(
            mapper()
                .map_value("r", &GraphValue::Relationship(relationship("r9", "OWNS", "a", "b")))
                .unwrap(),
        );
        assert_eq!(mapped.captions[0].value, "missing caption");
        assert_eq!(mapped.captions[0].styles, vec!["bold".to_string()]);
        assert_eq!(mapped.color, "gray");
    }

    #[test]
    fn test_path_keeps_order_and_direction() {
        let raw = path(
            vec![node("a", &["CVE"], &[]), node("b", &["Group"], &[])],
            vec![relationship("r1", "MENTIONS", "b", "a")],
        );
        let mapped = match mapper().map_value("p", &GraphValue::Path(raw)).unwrap() {
            Some(GraphElement::Path(path)) => path,
            other => panic!("expected path, got {:?}", other),
        };

        let ids: Vec<&str> = mapped.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(mapped.relationships[0].from, "b");
        assert_eq!(mapped.relationships[0].to, "a");
    }

    #[test]
    fn test_malformed_path_is_rejected() {
        let raw = RawPath {
            nodes: vec![node("a", &["CVE"], &[])],
            relationships: vec![relationship("r1", "MENTIONS", "a", "b")],
        };
        let err = mapper().map_value("p", &GraphValue::Path(raw)).unwrap_err();
        assert_eq!(
            err,
            MappingError::MalformedPath {
                column: "p".into(),
                nodes: 1,
                relationships: 1
            }
        );
    }

    #[test]
    fn test_scalars_and_nulls_contribute_nothing() {
        assert_eq!(mapper().map_value("c", &GraphValue::Null).unwrap(), None);
        assert_eq!(
            mapper()
                .map_value("c", &GraphValue::Scalar(PropertyValue::from(3i64)))
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_failing_column_is_isolated() {
        let broken = GraphValue::Relationship(RawRelationship {
            id: "r1".into(),
            rel_type: "MENTIONS".into(),
            endpoints: Endpoints::Ids {
                start: String::new(),
                end: "b".into(),
            },
            properties: Properties::new(),
        });
        let row = record(vec![
            ("a", GraphValue::Node(node("a", &["CVE"], &[]))),
            ("r", broken),
            ("count", GraphValue::Scalar(PropertyValue::from(2i64))),
            ("b", GraphValue::Node(node("b", &["Group"], &[]))),
        ]);

        let elements = mapper().map_record(row, &TraceContext::new_root()).await;
        let ids: Vec<String> = elements
            .iter()
            .map(|e| match e {
                GraphElement::Node(n) => n.id.clone(),
                other => panic!("unexpected element {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_single_worker_still_maps_every_column() {
        let mapper = RecordMapper::new(Arc::new(StyleConfig::builtin()), PartitionScheme::default(), 1);
        let row = record(
            (0..10)
                .map(|i| {
                    (
                        format!("c{}", i),
                        GraphValue::Node(node(&format!("n{}", i), &["CVE"], &[])),
                    )
                })
                .collect(),
        );
        let elements = mapper.map_record(row, &TraceContext::new_root()).await;
        assert_eq!(elements.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_worker_pool_bounds_concurrent_columns() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let row = record(
            (0..12)
                .map(|i| {
                    (
                        format!("c{}", i),
                        GraphValue::Node(node(&format!("n{}", i), &["CVE"], &[])),
                    )
                })
                .collect(),
        );

        let shaper = mapper().shaper;
        let (task_running, task_peak) = (Arc::clone(&running), Arc::clone(&peak));
        let elements = map_columns(row, 3, &TraceContext::new_root(), move |column, value| {
            let now = task_running.fetch_add(1, Ordering::SeqCst) + 1;
            task_peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            task_running.fetch_sub(1, Ordering::SeqCst);
            shaper.map_value(column, value)
        })
        .await;

        assert_eq!(elements.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3, "peak {}", peak.load(Ordering::SeqCst));
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_column_is_isolated() {
        let row = record(vec![
            ("a", GraphValue::Node(node("a", &["CVE"], &[]))),
            ("b", GraphValue::Node(node("b", &["CVE"], &[]))),
        ]);
        let shaper = mapper().shaper;
        let elements = map_columns(row, 2, &TraceContext::new_root(), move |column, value| {
            if column == "a" {
                panic!("shaping failed");
            }
            shaper.map_value(column, value)
        })
        .await;

        assert_eq!(elements.len(), 1);
    }
}
