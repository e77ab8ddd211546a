// src/services/extractor.rs

//! Field extractor.
//!
//! Resolves one [`FieldQuery`] against either a parsed page node or a JSON
//! object. Missing data never fails: it degrades to the query's literal text.

use indexmap::IndexMap;
use scraper::{ElementRef, Selector};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{FieldQuery, SELF_SELECTOR};
use crate::services::filters;
use crate::utils::parse::integer_string;
use crate::utils::path;

/// What a query is resolved against.
#[derive(Debug, Clone, Copy)]
pub enum Root<'a> {
    Node(ElementRef<'a>),
    Object(&'a Value),
}

/// Parse a CSS selector, reporting the offending text on failure.
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

/// Extract a single field.
///
/// Selectors are tried in order; the first one producing a non-empty value
/// wins. The filter chain keyed by that selector in `switch_filters` replaces
/// the generic `filters` chain. A query without selectors returns its literal
/// unfiltered. Integer-looking strings end up as numbers.
pub fn extract(root: Root<'_>, query: &FieldQuery) -> Result<Value> {
    let mut value = trim(literal(query));
    let mut matched: Option<&str> = None;

    for selector in query.selector_list() {
        let Some(found) = resolve(root, selector, query)? else {
            continue;
        };
        let found = trim(found);
        if !is_blank(&found) {
            value = found;
            matched = Some(selector.as_str());
            break;
        }
    }

    if !query.selector_list().is_empty() {
        let switched = matched.and_then(|selector| query.switch_filters.as_ref()?.get(selector));
        if let Some(chain) = switched.or(query.filters.as_ref()) {
            value = filters::run_chain(value, chain);
        }
    }

    Ok(coerce_integer(value))
}

/// Extract the listed fields that have a query in `selectors`.
pub fn extract_fields(
    root: Root<'_>,
    fields: &[&str],
    selectors: &IndexMap<String, FieldQuery>,
) -> Result<Map<String, Value>> {
    let mut values = Map::new();
    for field in fields {
        if let Some(query) = selectors.get(*field) {
            values.insert(field.to_string(), extract(root, query)?);
        }
    }
    Ok(values)
}

/// Whether `selector` finds anything under `root`: an element for nodes,
/// a truthy value for objects.
pub fn exists(root: Root<'_>, selector: &str) -> Result<bool> {
    match root {
        Root::Node(_) if selector == SELF_SELECTOR => Ok(true),
        Root::Node(element) => {
            let selector = parse_selector(selector)?;
            Ok(element.select(&selector).next().is_some())
        }
        Root::Object(object) if selector == SELF_SELECTOR => Ok(path::is_truthy(Some(object))),
        Root::Object(object) => Ok(path::is_truthy(path::get(object, selector))),
    }
}

/// The value one selector yields, or `None` when it finds nothing.
fn resolve(root: Root<'_>, selector: &str, query: &FieldQuery) -> Result<Option<Value>> {
    match root {
        Root::Node(element) => {
            let target = if selector == SELF_SELECTOR {
                Some(element)
            } else {
                element.select(&parse_selector(selector)?).next()
            };
            match target {
                Some(target) => read_element(target, query),
                None => Ok(None),
            }
        }
        Root::Object(object) => {
            let found = if selector == SELF_SELECTOR {
                Some(object)
            } else {
                path::get(object, selector)
            };
            Ok(found.filter(|v| !v.is_null()).cloned())
        }
    }
}

/// Read a matched element: processor, then case table, then dataset,
/// then attribute, then text.
fn read_element(element: ElementRef<'_>, query: &FieldQuery) -> Result<Option<Value>> {
    if let Some(process) = &query.element_process {
        return Ok(Some(process.call(element)));
    }

    if let Some(case) = &query.case {
        for (matcher, value) in case {
            if parse_selector(matcher)?.matches(&element) {
                return Ok(Some(value.clone()));
            }
        }
        return Ok(None);
    }

    if let Some(key) = &query.data {
        let name = dataset_attr(key);
        return Ok(element.value().attr(&name).map(|v| Value::String(v.to_string())));
    }

    if let Some(attr) = &query.attr {
        return Ok(element.value().attr(attr).map(|v| Value::String(v.to_string())));
    }

    let text: String = element.text().collect();
    Ok(Some(Value::String(text.replace('\n', " "))))
}

/// `cfemail` → `data-cfemail`, `torrentId` → `data-torrent-id`.
fn dataset_attr(key: &str) -> String {
    let mut name = String::from("data-");
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

/// The query's literal text as a string, empty when unset.
fn literal(query: &FieldQuery) -> Value {
    match &query.text {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(other) => Value::String(other.to_string()),
    }
}

fn trim(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

fn coerce_integer(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            integer_string(trimmed).unwrap_or_else(|| Value::String(trimmed.to_string()))
        }
        other => other,
    }
}
