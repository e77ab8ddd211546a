// src/services/rows.rs

//! Row extractor.
//!
//! Splits a fetched page or JSON body into the repeated structures that each
//! hold one record.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{RowsFilter, RowsQuery, SELF_SELECTOR};
use crate::services::extractor::{Root, parse_selector};
use crate::utils::path;

const ROW_GROUP_ATTR: &str = "data-row-group";

static ROW_GROUP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-row-group]").expect("static selector"));

/// Several adjacent page nodes regrouped under one container.
///
/// The nodes are re-parsed into their own fragment, inside a wrapper that keeps
/// them valid HTML (`<tbody>` for table rows, `<table>` for row groups, `<ul>`
/// for list items), so
/// positional selectors such as `tr:nth-child(2) td` keep working.
#[derive(Debug)]
pub struct MergedRow {
    fragment: Html,
}

impl MergedRow {
    fn new(nodes: &[ElementRef<'_>]) -> Self {
        let first = nodes.first().map(|el| el.value().name()).unwrap_or("div");
        let inner: String = nodes.iter().map(|el| el.html()).collect();
        let markup = match first {
            "tr" => format!("<table><tbody {ROW_GROUP_ATTR}>{inner}</tbody></table>"),
            "td" | "th" => {
                format!("<table><tbody><tr {ROW_GROUP_ATTR}>{inner}</tr></tbody></table>")
            }
            "tbody" | "thead" | "tfoot" | "caption" | "colgroup" => {
                format!("<table {ROW_GROUP_ATTR}>{inner}</table>")
            }
            "li" => format!("<ul {ROW_GROUP_ATTR}>{inner}</ul>"),
            "dt" | "dd" => format!("<dl {ROW_GROUP_ATTR}>{inner}</dl>"),
            _ => format!("<div {ROW_GROUP_ATTR}>{inner}</div>"),
        };
        Self {
            fragment: Html::parse_fragment(&markup),
        }
    }

    /// The synthetic container holding the grouped nodes.
    pub fn container(&self) -> ElementRef<'_> {
        self.fragment
            .select(&ROW_GROUP)
            .next()
            .unwrap_or_else(|| self.fragment.root_element())
    }

    /// Grouped nodes, in page order.
    pub fn nodes(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.container().child_elements()
    }
}

/// One record's raw sub-structure.
#[derive(Debug)]
pub enum Row<'a> {
    Node(ElementRef<'a>),
    Merged(MergedRow),
    Object(Value),
}

impl Row<'_> {
    /// The handle field queries are resolved against.
    pub fn root(&self) -> Root<'_> {
        match self {
            Row::Node(element) => Root::Node(*element),
            Row::Merged(merged) => Root::Node(merged.container()),
            Row::Object(value) => Root::Object(value),
        }
    }

    pub fn element(&self) -> Option<ElementRef<'_>> {
        match self.root() {
            Root::Node(element) => Some(element),
            Root::Object(_) => None,
        }
    }

    pub fn object(&self) -> Option<&Value> {
        match self {
            Row::Object(value) => Some(value),
            _ => None,
        }
    }
}

/// Locate the record rows under `root`.
///
/// Fails with [`AppError::NoRecords`] when nothing is left after filtering
/// and merging. On JSON bodies the selector must resolve to a list.
pub fn extract_rows<'a>(root: Root<'a>, query: &RowsQuery) -> Result<Vec<Row<'a>>> {
    let rows = match root {
        Root::Node(element) => node_rows(element, query)?,
        Root::Object(object) => object_rows(object, query)?,
    };

    log::debug!("Rows selector '{}' matched {} rows", query.selector, rows.len());
    if rows.is_empty() {
        return Err(AppError::NoRecords);
    }
    Ok(rows)
}

fn node_rows<'a>(element: ElementRef<'a>, query: &RowsQuery) -> Result<Vec<Row<'a>>> {
    let nodes: Vec<ElementRef<'a>> = if query.selector == SELF_SELECTOR {
        vec![element]
    } else {
        let selector = parse_selector(&query.selector)?;
        element.select(&selector).collect()
    };

    match &query.filter {
        Some(RowsFilter::Nodes(filter)) => {
            return Ok(filter(nodes).into_iter().map(Row::Node).collect());
        }
        Some(RowsFilter::Objects(_)) => {
            log::warn!(
                "Rows filter for '{}' expects JSON rows, ignoring it on a document",
                query.selector
            );
        }
        None => {}
    }

    let merge = query.merge.unwrap_or(1);
    if merge > 1 && !nodes.is_empty() {
        return Ok(nodes
            .chunks(merge)
            .map(|chunk| Row::Merged(MergedRow::new(chunk)))
            .collect());
    }
    Ok(nodes.into_iter().map(Row::Node).collect())
}

fn object_rows<'a>(object: &Value, query: &RowsQuery) -> Result<Vec<Row<'a>>> {
    let found = if query.selector == SELF_SELECTOR {
        Some(object)
    } else {
        path::get(object, &query.selector)
    };
    let Some(Value::Array(items)) = found else {
        return Err(AppError::parse(format!(
            "rows selector '{}' did not resolve to a list",
            query.selector
        )));
    };

    let items = match &query.filter {
        Some(RowsFilter::Objects(filter)) => filter(items.clone()),
        Some(RowsFilter::Nodes(_)) => {
            log::warn!(
                "Rows filter for '{}' expects document rows, ignoring it on JSON",
                query.selector
            );
            items.clone()
        }
        None => items.clone(),
    };
    Ok(items.into_iter().map(Row::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TABLE: &str = r#"
        <table class="torrents"><tbody>
            <tr class="head"><th>Name</th></tr>
            <tr><td class="name">a1</td></tr><tr><td class="meta">a2</td></tr>
            <tr><td class="name">b1</td></tr><tr><td class="meta">b2</td></tr>
            <tr><td class="name">c1</td></tr><tr><td class="meta">c2</td></tr>
        </tbody></table>
    "#;

    fn texts(row: &Row<'_>) -> Vec<String> {
        match row {
            Row::Merged(merged) => merged.nodes().map(|n| n.text().collect()).collect(),
            other => vec![other.element().unwrap().text().collect()],
        }
    }

    #[test]
    fn test_plain_rows() {
        let html = Html::parse_document(TABLE);
        let rows = extract_rows(
            Root::Node(html.root_element()),
            &RowsQuery::new("table.torrents tr:not(.head)"),
        )
        .unwrap();
        assert_eq!(rows.len(), 6);
        assert!(matches!(rows[0], Row::Node(_)));
    }

    #[test]
    fn test_merge_groups_adjacent_rows() {
        let html = Html::parse_document(TABLE);
        let query = RowsQuery::new("table.torrents tr:not(.head)").with_merge(2);
        let rows = extract_rows(Root::Node(html.root_element()), &query).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(texts(&rows[0]), vec!["a1", "a2"]);
        assert_eq!(texts(&rows[2]), vec!["c1", "c2"]);

        let root = rows[1].root();
        let Root::Node(container) = root else {
            panic!("merged row should be a node");
        };
        let second = parse_selector("tr:nth-child(2) td").unwrap();
        let cell: String = container.select(&second).next().unwrap().text().collect();
        assert_eq!(cell, "b2");
    }

    #[test]
    fn test_merge_row_groups() {
        let html = Html::parse_document(
            r#"<table class="t">
                <tbody><tr><td class="name">A</td></tr></tbody>
                <tbody><tr><td class="seeders">3</td></tr></tbody>
                <tbody><tr><td class="name">B</td></tr></tbody>
                <tbody><tr><td class="seeders">4</td></tr></tbody>
            </table>"#,
        );
        let query = RowsQuery::new("table.t > tbody").with_merge(2);
        let rows = extract_rows(Root::Node(html.root_element()), &query).unwrap();
        assert_eq!(rows.len(), 2);

        let Root::Node(container) = rows[1].root() else {
            panic!("merged row should be a node");
        };
        assert_eq!(container.value().name(), "table");
        assert_eq!(container.child_elements().count(), 2);
        let name = parse_selector("td.name").unwrap();
        let cell: String = container.select(&name).next().unwrap().text().collect();
        assert_eq!(cell, "B");
    }

    #[test]
    fn test_node_filter_replaces_merge() {
        let html = Html::parse_document(TABLE);
        let query = RowsQuery::new("table.torrents tr")
            .with_merge(2)
            .with_filter(RowsFilter::nodes(|rows| rows.into_iter().skip(1).collect()));
        let rows = extract_rows(Root::Node(html.root_element()), &query).unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(texts(&rows[0]), vec!["a1"]);
    }

    #[test]
    fn test_no_rows() {
        let html = Html::parse_document(TABLE);
        let result = extract_rows(Root::Node(html.root_element()), &RowsQuery::new("div.none"));
        assert!(matches!(result, Err(AppError::NoRecords)));
    }

    #[test]
    fn test_json_rows() {
        let body = json!({ "data": { "list": [{ "id": 1 }, { "id": 2 }, { "id": 3 }] } });
        let rows = extract_rows(Root::Object(&body), &RowsQuery::new("data.list")).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].object().unwrap()["id"], json!(2));

        let query = RowsQuery::new("data.list")
            .with_filter(RowsFilter::objects(|rows| rows.into_iter().take(1).collect()));
        assert_eq!(extract_rows(Root::Object(&body), &query).unwrap().len(), 1);
    }

    #[test]
    fn test_json_self_rows() {
        let body = json!([{ "id": 1 }]);
        let rows = extract_rows(Root::Object(&body), &RowsQuery::new(SELF_SELECTOR)).unwrap();
        assert_eq!(rows.len(), 1);

        let empty = json!([]);
        assert!(matches!(
            extract_rows(Root::Object(&empty), &RowsQuery::new(SELF_SELECTOR)),
            Err(AppError::NoRecords)
        ));
    }

    #[test]
    fn test_json_rows_not_a_list() {
        let body = json!({ "data": null });
        assert!(matches!(
            extract_rows(Root::Object(&body), &RowsQuery::new("data.list")),
            Err(AppError::Parse(_))
        ));
    }
}
