//! Canonical element shapes handed to visualization clients

use serde::Serialize;

use crate::data::values::Properties;

/// Caption entry rendered next to an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Caption {
    pub value: String,
    pub styles: Vec<String>,
}

/// Canonical node.
///
/// Domain properties are flattened next to the structural keys; the mapper
/// guarantees none of them reuses a structural key name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeElement {
    pub id: String,
    pub captions: Vec<Caption>,
    pub size: u32,
    pub color: String,
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Canonical relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipElement {
    pub id: String,
    pub relationship_type: String,
    pub from: String,
    pub to: String,
    pub captions: Vec<Caption>,
    pub color: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Path compound: ordered nodes and the relationships between them.
#[derive(Debug, Clone, PartialEq)]
pub struct PathElement {
    pub nodes: Vec<NodeElement>,
    pub relationships: Vec<RelationshipElement>,
}

/// Element produced by the record mapper for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphElement {
    Node(NodeElement),
    Relationship(RelationshipElement),
    Path(PathElement),
}

/// Deduplicated, budget-bounded graph returned by `render`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalGraph {
    pub nodes: Vec<NodeElement>,
    pub relationships: Vec<RelationshipElement>,
}

impl CanonicalGraph {
    pub fn len(&self) -> usize {
        self.nodes.len() + self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::values::PropertyValue;

    #[test]
    fn test_node_serialization_shape() {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), PropertyValue::from("CVE-2024-0001"));
        let node = NodeElement {
            id: "n1".to_string(),
            captions: vec![Caption { value: "CVE".to_string(), styles: vec!["bold".to_string()] }],
            size: 25,
            color: "yellow".to_string(),
            labels: vec!["CVE".to_string(), "t7".to_string()],
            properties,
        };

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "n1",
                "captions": [{"value": "CVE", "styles": ["bold"]}],
                "size": 25,
                "color": "yellow",
                "labels": ["CVE", "t7"],
                "name": "CVE-2024-0001"
            })
        );
    }

    #[test]
    fn test_relationship_serialization_uses_camel_case() {
        let rel = RelationshipElement {
            id: "r1".to_string(),
            relationship_type: "MENTIONS".to_string(),
            from: "n1".to_string(),
            to: "n2".to_string(),
            captions: vec![Caption { value: "MENTIONS".to_string(), styles: vec![] }],
            color: "black".to_string(),
            properties: Properties::new(),
        };

        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["relationshipType"], "MENTIONS");
        assert_eq!(json["from"], "n1");
        assert_eq!(json["to"], "n2");
    }
}
