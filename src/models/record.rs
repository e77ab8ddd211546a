//! Search result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names every record is resolved for, in resolution order.
pub const DEFAULT_RECORD_FIELDS: [&str; 16] = [
    "id",
    "title",
    "subTitle",
    "url",
    "link",
    "time",
    "size",
    "author",
    "seeders",
    "leechers",
    "completed",
    "comments",
    "category",
    "tags",
    "progress",
    "status",
];

/// A record while its fields are being resolved, keyed by camelCase field name.
pub type RecordDraft = Map<String, Value>;

/// A tag marker on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A finished search record.
///
/// Scalar fields keep the JSON value extraction produced: numeric-looking
/// values are numbers, anything else stays a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub site: String,
    /// Taken from `url` or `link` when the row has none; `null` if neither exists.
    #[serde(default)]
    pub id: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<Value>,

    /// Absolute detail page address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Absolute download address or magnet URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leechers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,

    /// Site-specific fields declared beyond the defaults.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Integer value of a numeric field, if it holds one.
    pub fn count(value: &Option<Value>) -> Option<i64> {
        value.as_ref().and_then(Value::as_i64)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_draft_value() {
        let record: Record = serde_json::from_value(json!({
            "site": "demo",
            "id": 42,
            "title": "Ubuntu 24.04",
            "subTitle": "Desktop ISO",
            "url": "https://x.example/details.php?id=42",
            "time": "2024-05-01T10:00:00Z",
            "seeders": 12,
            "tags": [{ "name": "Free" }],
            "hr": true
        }))
        .unwrap();

        assert_eq!(record.id, json!(42));
        assert_eq!(Record::count(&record.seeders), Some(12));
        assert!(record.has_tag("Free"));
        assert_eq!(record.extra["hr"], json!(true));
        assert_eq!(record.time.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
