//! Typed records extracted from `node` and `tag` elements
//!
//! Attributes are looked up by name and parsed into their declared types, so a
//! reordered or truncated element fails loudly instead of misreading a field.

use crate::cursor::Element;
use chrono::{DateTime, Utc};
use std::str::FromStr;

pub const NODE: &str = "node";
pub const TAG: &str = "tag";

/// What exactly was wrong with an attribute
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Problem {
    #[error("is missing")]
    Missing,
    #[error("at position {position} is not a valid {expected}: {value:?}")]
    Invalid {
        position: usize,
        value: String,
        expected: &'static str,
    },
}

/// A required attribute was absent or could not be parsed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed <{element}> element: attribute `{attribute}` {problem}")]
pub struct MalformedRecord {
    pub element: &'static str,
    pub attribute: &'static str,
    pub problem: Problem,
}

/// A single map point revision
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    /// contributor who authored this revision
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub version: i64,
    pub changeset: i64,
}

/// A key/value attribute attached to a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPair {
    pub key: String,
    pub value: String,
}

struct Fields<'a> {
    element: &'static str,
    raw: &'a Element,
}

impl<'a> Fields<'a> {
    fn text(&self, attribute: &'static str) -> Result<(usize, &'a str), MalformedRecord> {
        self.raw.attribute(attribute).ok_or(MalformedRecord {
            element: self.element,
            attribute,
            problem: Problem::Missing,
        })
    }

    fn parse_with<T>(
        &self,
        attribute: &'static str,
        expected: &'static str,
        f: impl FnOnce(&str) -> Option<T>,
    ) -> Result<T, MalformedRecord> {
        let (position, value) = self.text(attribute)?;
        f(value).ok_or_else(|| MalformedRecord {
            element: self.element,
            attribute,
            problem: Problem::Invalid {
                position,
                value: value.to_string(),
                expected,
            },
        })
    }

    fn parse<T: FromStr>(
        &self,
        attribute: &'static str,
        expected: &'static str,
    ) -> Result<T, MalformedRecord> {
        self.parse_with(attribute, expected, |v| v.parse().ok())
    }

    fn coordinate(&self, attribute: &'static str) -> Result<f64, MalformedRecord> {
        self.parse_with(attribute, "coordinate", |v| {
            v.parse::<f64>().ok().filter(|c| c.is_finite())
        })
    }
}

impl NodeRecord {
    /// Materialize a node from its opening element
    ///
    /// `uid`, `visible` and any other extra attributes are ignored.
    pub fn from_element(el: &Element) -> Result<Self, MalformedRecord> {
        let fields = Fields {
            element: NODE,
            raw: el,
        };
        Ok(Self {
            id: fields.parse("id", "integer")?,
            lat: fields.coordinate("lat")?,
            lon: fields.coordinate("lon")?,
            user: fields.text("user")?.1.to_string(),
            timestamp: fields.parse_with("timestamp", "RFC 3339 timestamp", |v| {
                DateTime::parse_from_rfc3339(v)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            })?,
            version: fields.parse("version", "integer")?,
            changeset: fields.parse("changeset", "integer")?,
        })
    }
}

impl TagPair {
    pub fn from_element(el: &Element) -> Result<Self, MalformedRecord> {
        let fields = Fields {
            element: TAG,
            raw: el,
        };
        Ok(Self {
            key: fields.text("k")?.1.to_string(),
            value: fields.text("v")?.1.to_string(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn node_el() -> Element {
        Element::new("node")
            .with("id", "240090160")
            .with("visible", "true")
            .with("version", "7")
            .with("changeset", "41193271")
            .with("timestamp", "2016-07-30T10:56:47Z")
            .with("user", "alice")
            .with("uid", "1234")
            .with("lat", "54.9833")
            .with("lon", "82.8964")
    }

    #[test]
    fn test_node_from_reordered_attributes() {
        let node = NodeRecord::from_element(&node_el()).unwrap();
        assert_eq!(node.id, 240090160);
        assert_eq!(node.user, "alice");
        assert_eq!(node.version, 7);
        assert_eq!(node.changeset, 41193271);
        assert_eq!(node.lat, 54.9833);
        assert_eq!(node.lon, 82.8964);
        assert_eq!(
            node.timestamp,
            Utc.with_ymd_and_hms(2016, 7, 30, 10, 56, 47).unwrap()
        );
    }

    #[test]
    fn test_node_missing_user() {
        let mut el = node_el();
        el.attributes.retain(|(k, _)| k != "user");
        let err = NodeRecord::from_element(&el).unwrap_err();
        assert_eq!(err.attribute, "user");
        assert_eq!(err.problem, Problem::Missing);
    }

    #[test]
    fn test_node_bad_number_reports_position() {
        let mut el = node_el();
        el.attributes[0].1 = "12x".into();
        let err = NodeRecord::from_element(&el).unwrap_err();
        assert_eq!(err.element, "node");
        assert_eq!(err.attribute, "id");
        assert_eq!(
            err.problem,
            Problem::Invalid {
                position: 0,
                value: "12x".into(),
                expected: "integer",
            }
        );
        assert!(err.to_string().contains("position 0"));
    }

    #[test]
    fn test_node_rejects_non_finite_coordinate() {
        let mut el = node_el();
        el.attributes[7].1 = "NaN".into();
        let err = NodeRecord::from_element(&el).unwrap_err();
        assert_eq!(err.attribute, "lat");
    }

    #[test]
    fn test_node_bad_timestamp() {
        let mut el = node_el();
        el.attributes[4].1 = "yesterday".into();
        let err = NodeRecord::from_element(&el).unwrap_err();
        assert_eq!(err.attribute, "timestamp");
    }

    #[test]
    fn test_tag_pair() {
        let el = Element::new("tag").with("v", "primary").with("k", "highway");
        let tag = TagPair::from_element(&el).unwrap();
        assert_eq!(tag.key, "highway");
        assert_eq!(tag.value, "primary");

        let err = TagPair::from_element(&Element::new("tag").with("k", "x")).unwrap_err();
        assert_eq!(err.attribute, "v");
    }
}
