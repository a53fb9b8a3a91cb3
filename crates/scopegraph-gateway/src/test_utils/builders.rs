//! Builders for raw store values

use crate::data::{
    Endpoints, GraphValue, Properties, PropertyValue, RawNode, RawPath, RawRelationship, Record,
};

fn properties(props: &[(&str, PropertyValue)]) -> Properties {
    props
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub fn node(id: &str, labels: &[&str], props: &[(&str, PropertyValue)]) -> RawNode {
    RawNode {
        id: id.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        properties: properties(props),
    }
}

/// Relationship that refers to its endpoints by id.
pub fn relationship(id: &str, rel_type: &str, start: &str, end: &str) -> RawRelationship {
    RawRelationship {
        id: id.to_string(),
        rel_type: rel_type.to_string(),
        endpoints: Endpoints::Ids {
            start: start.to_string(),
            end: end.to_string(),
        },
        properties: Properties::new(),
    }
}

/// Relationship that carries its full endpoint nodes.
pub fn relationship_with_nodes(
    id: &str,
    rel_type: &str,
    start: RawNode,
    end: RawNode,
) -> RawRelationship {
    RawRelationship {
        id: id.to_string(),
        rel_type: rel_type.to_string(),
        endpoints: Endpoints::Nodes {
            start: Box::new(start),
            end: Box::new(end),
        },
        properties: Properties::new(),
    }
}

pub fn path(nodes: Vec<RawNode>, relationships: Vec<RawRelationship>) -> RawPath {
    RawPath {
        nodes,
        relationships,
    }
}

pub fn record<K: Into<String>>(columns: Vec<(K, GraphValue)>) -> Record {
    columns
        .into_iter()
        .map(|(column, value)| (column.into(), value))
        .collect()
}
