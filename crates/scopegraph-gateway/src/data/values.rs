//! Driver-neutral shapes of the values a query result row can hold.
//!
//! Store adapters convert whatever their driver hands back into these types, so
//! the mapper can match every column shape exhaustively.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Ordered property map, as returned by the store.
pub type Properties = IndexMap<String, PropertyValue>;

/// One raw result row: column name to value, in column order.
pub type Record = IndexMap<String, GraphValue>;

/// Shape of a single result column.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Scalar(PropertyValue),
    Node(RawNode),
    Relationship(RawRelationship),
    Path(RawPath),
}

/// Property value stored on a node or relationship.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(IndexMap<String, PropertyValue>),
    Temporal(Temporal),
}

impl PropertyValue {
    /// Text form used when a property becomes a caption.
    pub fn display_text(&self) -> Option<String> {
        match self {
            PropertyValue::Null => None,
            PropertyValue::Bool(b) => Some(b.to_string()),
            PropertyValue::Integer(i) => Some(i.to_string()),
            PropertyValue::Float(f) => Some(f.to_string()),
            PropertyValue::String(s) => Some(s.clone()),
            PropertyValue::Temporal(t) => Some(t.to_iso8601()),
            PropertyValue::List(_) | PropertyValue::Map(_) => serde_json::to_string(self).ok(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Temporal property values. Always leave the gateway as ISO-8601 text.
#[derive(Debug, Clone, PartialEq)]
pub enum Temporal {
    Date(NaiveDate),
    LocalTime(NaiveTime),
    Time(NaiveTime, FixedOffset),
    LocalDateTime(NaiveDateTime),
    DateTime(DateTime<FixedOffset>),
    /// Local date-time in a named zone, rendered with the zone id in brackets.
    ZonedDateTime(NaiveDateTime, String),
}

impl Temporal {
    pub fn to_iso8601(&self) -> String {
        match self {
            Temporal::Date(d) => d.format("%Y-%m-%d").to_string(),
            Temporal::LocalTime(t) => t.format("%H:%M:%S%.f").to_string(),
            Temporal::Time(t, offset) => format!("{}{}", t.format("%H:%M:%S%.f"), offset),
            Temporal::LocalDateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Temporal::DateTime(dt) => dt.to_rfc3339(),
            Temporal::ZonedDateTime(dt, zone) => {
                format!("{}[{}]", dt.format("%Y-%m-%dT%H:%M:%S%.f"), zone)
            }
        }
    }
}

impl Serialize for Temporal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

/// Node as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Properties,
}

/// How a raw relationship refers to its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoints {
    /// Full endpoint nodes, as produced by traversal results.
    Nodes { start: Box<RawNode>, end: Box<RawNode> },
    /// Endpoint element ids only.
    Ids { start: String, end: String },
}

impl Endpoints {
    pub fn start_id(&self) -> &str {
        match self {
            Endpoints::Nodes { start, .. } => &start.id,
            Endpoints::Ids { start, .. } => start,
        }
    }

    pub fn end_id(&self) -> &str {
        match self {
            Endpoints::Nodes { end, .. } => &end.id,
            Endpoints::Ids { end, .. } => end,
        }
    }
}

/// Relationship as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelationship {
    pub id: String,
    pub rel_type: String,
    pub endpoints: Endpoints,
    pub properties: Properties,
}

/// Path as returned by the store: `nodes.len() == relationships.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPath {
    pub nodes: Vec<RawNode>,
    pub relationships: Vec<RawRelationship>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_temporal_values_serialize_as_iso8601() {
        let date = PropertyValue::Temporal(Temporal::Date(
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        ));
        let offset = FixedOffset::east_opt(3600).unwrap();
        let datetime = PropertyValue::Temporal(Temporal::DateTime(
            offset.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap(),
        ));
        let local = PropertyValue::Temporal(Temporal::LocalDateTime(
            NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(8, 5, 1)
                .unwrap(),
        ));

        assert_eq!(serde_json::to_value(&date).unwrap(), "2024-03-09");
        assert_eq!(serde_json::to_value(&datetime).unwrap(), "2024-03-09T14:30:00+01:00");
        assert_eq!(serde_json::to_value(&local).unwrap(), "2024-03-09T08:05:01");
    }

    #[test]
    fn test_time_values_serialize_as_iso8601() {
        let noon = NaiveTime::from_hms_opt(12, 0, 5).unwrap();
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let zoned = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 1)
            .unwrap();

        assert_eq!(Temporal::LocalTime(noon).to_iso8601(), "12:00:05");
        assert_eq!(Temporal::Time(noon, offset).to_iso8601(), "12:00:05-05:00");
        assert_eq!(
            Temporal::ZonedDateTime(zoned, "Europe/Berlin".to_string()).to_iso8601(),
            "2024-03-09T08:05:01[Europe/Berlin]"
        );
    }

    #[test]
    fn test_nested_property_values_serialize_untagged() {
        let mut inner = IndexMap::new();
        inner.insert("score".to_string(), PropertyValue::Float(9.8));
        let value = PropertyValue::List(vec![
            PropertyValue::Integer(1),
            PropertyValue::Map(inner),
            PropertyValue::Null,
        ]);

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            serde_json::json!([1, {"score": 9.8}, null])
        );
    }

    #[test]
    fn test_display_text() {
        assert_eq!(PropertyValue::from("Critical").display_text().as_deref(), Some("Critical"));
        assert_eq!(PropertyValue::Integer(7).display_text().as_deref(), Some("7"));
        assert_eq!(PropertyValue::Null.display_text(), None);
    }
}
