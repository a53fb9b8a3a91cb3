use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use neo4rs::{
    BoltList, BoltMap, BoltNode, BoltPath, BoltRelation, BoltType, BoltUnboundedRelation,
    ConfigBuilder, Graph, Query,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::Neo4jConfig,
    data::{
        Endpoints, GraphValue, Identity, Properties, PropertyValue, RawNode, RawPath,
        RawRelationship, Record, StoreError, Temporal, TraceContext,
    },
    traits::GraphStore,
};

const LABEL_CATALOG_QUERY: &str = "CALL db.labels() YIELD label RETURN label";

/// Maps a driver error onto the gateway's fault classes.
///
/// Transport failures (socket errors, a closed connection, a protocol
/// message arriving mid-exchange) mean the store went away and are
/// retryable. Everything else is classified by its Neo4j status code.
pub fn classify_driver_error(error: &neo4rs::Error) -> StoreError {
    match error {
        neo4rs::Error::IOError { .. }
        | neo4rs::Error::ConnectionError
        | neo4rs::Error::UnexpectedMessage(_) => {
            StoreError::ServiceUnavailable(error.to_string())
        }
        other => classify_error(&other.to_string()),
    }
}

/// Maps driver error text onto the gateway's fault classes using Neo4j status codes.
pub fn classify_error(message: &str) -> StoreError {
    let message = message.to_string();
    if message.contains("Neo.TransientError") || message.contains("SessionExpired") {
        StoreError::SessionExpired(message)
    } else if message.contains("ServiceUnavailable")
        || message.contains("IO Error")
        || message.contains("Connection refused")
        || message.contains("Connection reset")
        || message.contains("connection closed")
        || message.contains("Broken pipe")
    {
        StoreError::ServiceUnavailable(message)
    } else if message.contains("Neo.ClientError.Statement") {
        StoreError::Syntax(message)
    } else if message.contains("Neo.ClientError.Security") {
        StoreError::Authorization(message)
    } else {
        StoreError::Client(message)
    }
}

/// Neo4j implementation of the `GraphStore` trait
pub struct Neo4jGraphStore {
    graph: Arc<Graph>,
}

impl Neo4jGraphStore {
    /// Connects to Neo4j, retrying and verifying the connection with `RETURN 1`.
    pub async fn connect(config: Neo4jConfig) -> Result<Self, StoreError> {
        let mut config_builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.username)
            .password(&config.password)
            .max_connections(config.pool_size);

        if let Some(db) = &config.database {
            config_builder = config_builder.db(db.as_str());
        }

        let neo4j_config = config_builder
            .build()
            .map_err(|e| StoreError::Connection(format!("Failed to build Neo4j config: {}", e)))?;

        let attempts = config.connection_retry_count.max(1);
        let retry_delay = Duration::from_millis(config.connection_retry_delay_ms);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match Graph::connect(neo4j_config.clone()).await {
                Ok(graph) => {
                    info!("Connected to Neo4j at {} (attempt {})", config.uri, attempt);
                    match graph.execute(Query::new("RETURN 1 AS test".to_string())).await {
                        Ok(_) => {
                            return Ok(Self {
                                graph: Arc::new(graph),
                            });
                        }
                        Err(e) => {
                            error!("Connection test failed: {}", e);
                            last_error = Some(e.to_string());
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to connect to Neo4j (attempt {}): {}", attempt, e);
                    last_error = Some(e.to_string());
                }
            }
            if attempt < attempts {
                tokio::time::sleep(retry_delay).await;
            }
        }

        Err(StoreError::Connection(format!(
            "Failed to connect to Neo4j after {} attempts. Last error: {}",
            attempts,
            last_error.unwrap_or_default()
        )))
    }

    async fn fetch_rows(&self, query: &str) -> Result<Vec<neo4rs::Row>, StoreError> {
        let mut stream = self
            .graph
            .execute(Query::new(query.to_string()))
            .await
            .map_err(|e| classify_driver_error(&e))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| classify_driver_error(&e))?
        {
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    #[instrument(
        skip(self, query),
        fields(identity = %identity, trace_id = %trace_ctx.trace_id, stage = %trace_ctx.stage)
    )]
    async fn run(
        &self,
        identity: &Identity,
        trace_ctx: &TraceContext,
        query: &str,
    ) -> Result<Vec<Record>, StoreError> {
        // The driver has no impersonation support; access control applies
        // to the gateway account and the identity is kept for audit logs.
        debug!(query, "Executing query");
        let rows = self.fetch_rows(query).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(row_to_record(&row)?);
        }
        debug!(rows = records.len(), "Query returned rows");
        Ok(records)
    }

    #[instrument(skip(self), fields(trace_id = %trace_ctx.trace_id))]
    async fn partition_labels(&self, trace_ctx: &TraceContext) -> Result<Vec<String>, StoreError> {
        let rows = self.fetch_rows(LABEL_CATALOG_QUERY).await?;
        let mut labels = Vec::with_capacity(rows.len());
        for row in rows {
            match row.get::<String>("label") {
                Ok(label) => labels.push(label),
                Err(e) => warn!("Skipping unreadable label row: {}", e),
            }
        }
        Ok(labels)
    }
}

fn row_to_record(row: &neo4rs::Row) -> Result<Record, StoreError> {
    let mut record = Record::new();
    for key in row.keys() {
        let column = key.value.clone();
        let value = row
            .get::<BoltType>(&column)
            .map_err(|e| StoreError::Client(format!("Unreadable column '{}': {}", column, e)))?;
        record.insert(column, to_graph_value(&value));
    }
    Ok(record)
}

fn to_graph_value(value: &BoltType) -> GraphValue {
    match value {
        BoltType::Null(_) => GraphValue::Null,
        BoltType::Node(node) => GraphValue::Node(to_raw_node(node)),
        BoltType::Relation(rel) => GraphValue::Relationship(to_raw_relationship(rel)),
        BoltType::UnboundedRelation(rel) => {
            // Endpoints are unknown outside a path.
            GraphValue::Relationship(unbounded_relationship(rel, String::new(), String::new()))
        }
        BoltType::Path(path) => GraphValue::Path(to_raw_path(path)),
        other => GraphValue::Scalar(to_property_value(other)),
    }
}

fn integer_at(list: &BoltList, index: usize) -> Option<i64> {
    match list.value.get(index) {
        Some(BoltType::Integer(i)) => Some(i.value),
        _ => None,
    }
}

fn to_raw_node(node: &BoltNode) -> RawNode {
    let labels = node
        .labels
        .value
        .iter()
        .filter_map(|label| match label {
            BoltType::String(s) => Some(s.value.clone()),
            _ => None,
        })
        .collect();
    RawNode {
        id: node.id.value.to_string(),
        labels,
        properties: to_properties(&node.properties),
    }
}

fn to_raw_relationship(rel: &BoltRelation) -> RawRelationship {
    RawRelationship {
        id: rel.id.value.to_string(),
        rel_type: rel.typ.value.clone(),
        endpoints: Endpoints::Ids {
            start: rel.start_node_id.value.to_string(),
            end: rel.end_node_id.value.to_string(),
        },
        properties: to_properties(&rel.properties),
    }
}

fn unbounded_relationship(rel: &BoltUnboundedRelation, start: String, end: String) -> RawRelationship {
    RawRelationship {
        id: rel.id.value.to_string(),
        rel_type: rel.typ.value.clone(),
        endpoints: Endpoints::Ids { start, end },
        properties: to_properties(&rel.properties),
    }
}

/// Rebuilds a path from the bolt index list.
///
/// Indices come in pairs: a 1-based relationship index, negative when the
/// relationship is traversed against its direction, then the index of the
/// next node.
fn to_raw_path(path: &BoltPath) -> RawPath {
    let all_nodes: Vec<RawNode> = path
        .nodes
        .value
        .iter()
        .filter_map(|n| match n {
            BoltType::Node(node) => Some(to_raw_node(node)),
            _ => None,
        })
        .collect();
    let all_rels: Vec<&BoltUnboundedRelation> = path
        .rels
        .value
        .iter()
        .filter_map(|r| match r {
            BoltType::UnboundedRelation(rel) => Some(rel),
            _ => None,
        })
        .collect();

    let mut nodes = Vec::new();
    let mut relationships = Vec::new();
    let Some(first) = all_nodes.first() else {
        return RawPath { nodes, relationships };
    };
    nodes.push(first.clone());

    let segments = path.indices.value.len() / 2;
    for segment in 0..segments {
        let (Some(rel_index), Some(node_index)) = (
            integer_at(&path.indices, segment * 2),
            integer_at(&path.indices, segment * 2 + 1),
        ) else {
            break;
        };
        let Some(next) = usize::try_from(node_index).ok().and_then(|i| all_nodes.get(i)) else {
            break;
        };
        let Some(rel) = usize::try_from(rel_index.unsigned_abs())
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| all_rels.get(i))
        else {
            break;
        };

        let previous = nodes[nodes.len() - 1].id.clone();
        let (start, end) = if rel_index > 0 {
            (previous, next.id.clone())
        } else {
            (next.id.clone(), previous)
        };
        relationships.push(unbounded_relationship(rel, start, end));
        nodes.push(next.clone());
    }

    RawPath { nodes, relationships }
}

fn to_properties(map: &BoltMap) -> Properties {
    let mut properties: Vec<(String, PropertyValue)> = map
        .value
        .iter()
        .map(|(key, value)| (key.value.clone(), to_property_value(value)))
        .collect();
    // Bolt maps are unordered; sort for a stable output.
    properties.sort_by(|a, b| a.0.cmp(&b.0));
    properties.into_iter().collect()
}

fn to_property_value(value: &BoltType) -> PropertyValue {
    match value {
        BoltType::Null(_) => PropertyValue::Null,
        BoltType::Boolean(b) => PropertyValue::Bool(b.value),
        BoltType::Integer(i) => PropertyValue::Integer(i.value),
        BoltType::Float(f) => PropertyValue::Float(f.value),
        BoltType::String(s) => PropertyValue::String(s.value.clone()),
        BoltType::List(list) => {
            PropertyValue::List(list.value.iter().map(to_property_value).collect())
        }
        BoltType::Map(map) => PropertyValue::Map(to_properties(map)),
        BoltType::Date(date) => {
            let converted: Result<NaiveDate, _> = date.try_into();
            temporal_or_null(converted.ok().map(Temporal::Date))
        }
        BoltType::LocalDateTime(datetime) => {
            let converted: Result<NaiveDateTime, _> = datetime.try_into();
            temporal_or_null(converted.ok().map(Temporal::LocalDateTime))
        }
        BoltType::DateTime(datetime) => {
            let converted: Result<DateTime<FixedOffset>, _> = datetime.try_into();
            temporal_or_null(converted.ok().map(Temporal::DateTime))
        }
        BoltType::DateTimeZoneId(datetime) => {
            let converted: Result<(NaiveDateTime, String), _> = datetime.try_into();
            temporal_or_null(
                converted
                    .ok()
                    .map(|(local, zone)| Temporal::ZonedDateTime(local, zone)),
            )
        }
        BoltType::LocalTime(time) => {
            let converted: Result<NaiveTime, _> = time.try_into();
            temporal_or_null(converted.ok().map(Temporal::LocalTime))
        }
        BoltType::Time(time) => {
            let converted: Result<(NaiveTime, FixedOffset), _> = time.try_into();
            temporal_or_null(
                converted
                    .ok()
                    .map(|(local, offset)| Temporal::Time(local, offset)),
            )
        }
        other => {
            debug!("Unsupported property type dropped: {:?}", other);
            PropertyValue::Null
        }
    }
}

fn temporal_or_null(value: Option<Temporal>) -> PropertyValue {
    match value {
        Some(temporal) => PropertyValue::Temporal(temporal),
        None => {
            warn!("Temporal value out of range, dropped");
            PropertyValue::Null
        }
    }
}
