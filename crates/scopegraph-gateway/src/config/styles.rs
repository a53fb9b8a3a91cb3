//! Caption and style tables keyed by label or relationship type.
//!
//! Loaded once at startup and shared read-only by every mapper worker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::data::ConfigError;

pub const DEFAULT_NODE_SIZE: u32 = 30;
pub const DEFAULT_COLOR: &str = "gray";
pub const DEFAULT_STYLE: &str = "bold";
pub const MISSING_CAPTION: &str = "missing caption";

/// Style entry for a node label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelStyle {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub styles: Option<Vec<String>>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Style entry for a relationship type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipStyle {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub styles: Option<Vec<String>>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Node style with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNodeStyle {
    pub styles: Vec<String>,
    pub size: u32,
    pub color: String,
}

/// Relationship style with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRelationshipStyle {
    pub caption: String,
    pub styles: Vec<String>,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    #[serde(default)]
    pub labels: HashMap<String, LabelStyle>,
    #[serde(default)]
    pub relationships: HashMap<String, RelationshipStyle>,
}

impl StyleConfig {
    /// Table shipped with the gateway when no style file is configured.
    pub fn builtin() -> Self {
        let label = |caption: &str, size: u32, color: &str| LabelStyle {
            caption: Some(caption.to_string()),
            styles: Some(vec![DEFAULT_STYLE.to_string()]),
            size: Some(size),
            color: Some(color.to_string()),
        };

        let mut labels = HashMap::new();
        labels.insert("ResultItem".to_string(), label("ResultItem", 30, "green"));
        labels.insert("CVE".to_string(), label("CVE", 25, "yellow"));
        labels.insert("Group".to_string(), label("Group", 25, "red"));

        let mut relationships = HashMap::new();
        relationships.insert(
            "MENTIONS".to_string(),
            RelationshipStyle {
                caption: Some("MENTIONS".to_string()),
                styles: Some(vec![]),
                color: Some("black".to_string()),
            },
        );

        Self { labels, relationships }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::StyleFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    pub fn node_style(&self, label: Option<&str>) -> ResolvedNodeStyle {
        let entry = label.and_then(|l| self.labels.get(l));
        ResolvedNodeStyle {
            styles: entry
                .and_then(|e| e.styles.clone())
                .unwrap_or_else(|| vec![DEFAULT_STYLE.to_string()]),
            size: entry.and_then(|e| e.size).unwrap_or(DEFAULT_NODE_SIZE),
            color: entry
                .and_then(|e| e.color.clone())
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        }
    }

    pub fn relationship_style(&self, rel_type: &str) -> ResolvedRelationshipStyle {
        let entry = self.relationships.get(rel_type);
        ResolvedRelationshipStyle {
            caption: entry
                .and_then(|e| e.caption.clone())
                .unwrap_or_else(|| MISSING_CAPTION.to_string()),
            styles: entry
                .and_then(|e| e.styles.clone())
                .unwrap_or_else(|| vec![DEFAULT_STYLE.to_string()]),
            color: entry
                .and_then(|e| e.color.clone())
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        }
    }
}
