//! Declarative field and row queries.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use scraper::ElementRef;
use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Selector token meaning "use the current node or object itself".
pub const SELF_SELECTOR: &str = ":self";

type CustomFilterFn = dyn Fn(Value, &[Value]) -> Value + Send + Sync;
type ElementProcessFn = dyn for<'a> Fn(ElementRef<'a>) -> Value + Send + Sync;
type NodeRowsFn = dyn for<'a> Fn(Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> + Send + Sync;
type ObjectRowsFn = dyn Fn(Vec<Value>) -> Vec<Value> + Send + Sync;

/// `{ name, args }` descriptor resolved against the filter registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFilter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

/// One step of a value pipeline.
#[derive(Clone)]
pub enum ValueFilter {
    Named(NamedFilter),
    Custom(Arc<CustomFilterFn>),
}

impl ValueFilter {
    pub fn named(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Named(NamedFilter {
            name: name.into(),
            args,
        })
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Value, &[Value]) -> Value + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }
}

impl fmt::Debug for ValueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(named) => named.fmt(f),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl<'de> Deserialize<'de> for ValueFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NamedFilter::deserialize(deserializer).map(Self::Named)
    }
}

impl Serialize for ValueFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Named(named) => named.serialize(serializer),
            Self::Custom(_) => Err(ser::Error::custom("custom filters cannot be serialized")),
        }
    }
}

/// Turns the matched element into a value, bypassing text/attr extraction.
#[derive(Clone)]
pub struct ElementProcess(Arc<ElementProcessFn>);

impl ElementProcess {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(ElementRef<'a>) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, element: ElementRef<'_>) -> Value {
        (self.0)(element)
    }
}

impl fmt::Debug for ElementProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ElementProcess(<fn>)")
    }
}

/// Post-processes the matched rows, e.g. to drop header rows.
#[derive(Clone)]
pub enum RowsFilter {
    Nodes(Arc<NodeRowsFn>),
    Objects(Arc<ObjectRowsFn>),
}

impl RowsFilter {
    pub fn nodes<F>(f: F) -> Self
    where
        F: for<'a> Fn(Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> + Send + Sync + 'static,
    {
        Self::Nodes(Arc::new(f))
    }

    pub fn objects<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    {
        Self::Objects(Arc::new(f))
    }
}

impl fmt::Debug for RowsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes(_) => f.write_str("Nodes(<fn>)"),
            Self::Objects(_) => f.write_str("Objects(<fn>)"),
        }
    }
}

/// How to locate and post-process a single field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldQuery {
    /// Fallback selectors, tried in order.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub selector: Option<Vec<String>>,

    /// Literal value used when no selector yields anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,

    /// Dataset key (`cfemail` reads `data-cfemail`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Matcher selector → literal value, first match wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<IndexMap<String, Value>>,

    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub filters: Option<Vec<ValueFilter>>,

    /// Matched selector → filter chain used instead of `filters`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_filters: Option<IndexMap<String, Vec<ValueFilter>>>,

    #[serde(skip)]
    pub element_process: Option<ElementProcess>,
}

impl FieldQuery {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(vec![selector.into()]),
            ..Self::default()
        }
    }

    pub fn selectors<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selector: Some(selectors.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn literal(text: impl Into<Value>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>) -> Self {
        self.data = Some(key.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<Value>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_case(mut self, matcher: impl Into<String>, value: impl Into<Value>) -> Self {
        self.case
            .get_or_insert_with(IndexMap::new)
            .insert(matcher.into(), value.into());
        self
    }

    pub fn with_filter(mut self, filter: ValueFilter) -> Self {
        self.filters.get_or_insert_with(Vec::new).push(filter);
        self
    }

    pub fn with_switch_filters(mut self, selector: impl Into<String>, chain: Vec<ValueFilter>) -> Self {
        self.switch_filters
            .get_or_insert_with(IndexMap::new)
            .insert(selector.into(), chain);
        self
    }

    pub fn with_element_process(mut self, process: ElementProcess) -> Self {
        self.element_process = Some(process);
        self
    }

    pub fn selector_list(&self) -> &[String] {
        self.selector.as_deref().unwrap_or_default()
    }
}

/// Locates the repeated record structures in a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowsQuery {
    #[serde(default)]
    pub selector: String,

    /// Number of adjacent structural rows forming one record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<usize>,

    #[serde(skip)]
    pub filter: Option<RowsFilter>,
}

impl RowsQuery {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Self::default()
        }
    }

    pub fn with_merge(mut self, merge: usize) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn with_filter(mut self, filter: RowsFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A tag marker set when `selector` is present in a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagQuery {
    pub name: String,
    pub selector: String,
}

/// The `selectors` block of a search entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSelectors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<RowsQuery>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagQuery>>,

    #[serde(flatten)]
    pub fields: IndexMap<String, FieldQuery>,
}

impl SearchSelectors {
    pub fn with_rows(mut self, rows: RowsQuery) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, query: FieldQuery) -> Self {
        self.fields.insert(name.into(), query);
        self
    }

    pub fn with_tags(mut self, tags: Vec<TagQuery>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Declared field names in declaration order, `rows` excluded.
    pub fn declared_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        if self.tags.is_some() {
            names.push("tags");
        }
        names
    }
}

/// Accept either a single item or a list of items.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    match Option::<OneOrMany<T>>::deserialize(deserializer) {
        Ok(Some(OneOrMany::One(item))) => Ok(Some(vec![item])),
        Ok(Some(OneOrMany::Many(items))) => Ok(Some(items)),
        Ok(None) => Ok(None),
        Err(_) => Err(de::Error::custom("expected a single item or a list")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_query_single_selector() {
        let query: FieldQuery = serde_json::from_value(json!({
            "selector": "a.title",
            "attr": "href"
        }))
        .unwrap();
        assert_eq!(query.selector_list(), ["a.title".to_string()]);
        assert_eq!(query.attr.as_deref(), Some("href"));
    }

    #[test]
    fn test_field_query_filters_and_switch() {
        let query: FieldQuery = serde_json::from_value(json!({
            "selector": ["td.size", "td:nth-child(5)"],
            "filters": { "name": "parseSize" },
            "switchFilters": { "td:nth-child(5)": [{ "name": "trim" }, { "name": "parseSize" }] }
        }))
        .unwrap();
        assert_eq!(query.selector_list().len(), 2);
        assert_eq!(query.filters.as_ref().map(Vec::len), Some(1));
        assert_eq!(query.switch_filters.unwrap()["td:nth-child(5)"].len(), 2);
    }

    #[test]
    fn test_selectors_flatten_fields() {
        let selectors: SearchSelectors = serde_json::from_value(json!({
            "rows": { "selector": "table.torrents > tbody > tr", "merge": 2 },
            "title": { "selector": "a.name" },
            "tags": [{ "name": "Free", "selector": "img.free" }]
        }))
        .unwrap();
        assert_eq!(selectors.rows.as_ref().unwrap().merge, Some(2));
        assert_eq!(selectors.declared_fields(), vec!["title", "tags"]);
    }

    #[test]
    fn test_custom_filter_not_serializable() {
        let filter = ValueFilter::custom(|value, _| value);
        assert!(serde_json::to_value(&filter).is_err());
    }
}
