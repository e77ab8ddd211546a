//! Field-by-field overlay of configuration values.
//!
//! `Some` overlay scalars replace, maps merge key by key, request configs merge
//! as JSON objects, lists are replaced whole.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::models::{
    AdvanceKeywordConfig, DetailEntry, FieldQuery, RequestConfig, RowsQuery, SearchEntry,
    SearchSelectors,
};
use crate::models::request::merge_value;

/// Deep overlay of `overlay` onto `self`.
pub trait Merge {
    fn merge_from(&mut self, overlay: &Self);

    fn merged(&self, overlay: &Self) -> Self
    where
        Self: Clone,
    {
        let mut base = self.clone();
        base.merge_from(overlay);
        base
    }
}

fn replace<T: Clone>(base: &mut Option<T>, overlay: &Option<T>) {
    if let Some(value) = overlay {
        *base = Some(value.clone());
    }
}

fn merge_option<T: Merge + Clone>(base: &mut Option<T>, overlay: &Option<T>) {
    match (base.as_mut(), overlay) {
        (Some(base), Some(overlay)) => base.merge_from(overlay),
        (None, Some(overlay)) => *base = Some(overlay.clone()),
        _ => {}
    }
}

impl<K, V> Merge for IndexMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Merge + Clone,
{
    fn merge_from(&mut self, overlay: &Self) {
        for (key, value) in overlay {
            match self.get_mut(key) {
                Some(existing) => existing.merge_from(value),
                None => {
                    self.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl<T: Clone> Merge for Vec<T> {
    fn merge_from(&mut self, overlay: &Self) {
        *self = overlay.clone();
    }
}

impl Merge for RequestConfig {
    fn merge_from(&mut self, overlay: &Self) {
        let (Ok(mut base), Ok(overlay_value)) =
            (serde_json::to_value(&*self), serde_json::to_value(overlay))
        else {
            return;
        };
        merge_value(&mut base, &overlay_value);
        if let Ok(merged) = serde_json::from_value(base) {
            *self = merged;
        }
    }
}

impl Merge for FieldQuery {
    fn merge_from(&mut self, overlay: &Self) {
        replace(&mut self.selector, &overlay.selector);
        replace(&mut self.text, &overlay.text);
        replace(&mut self.attr, &overlay.attr);
        replace(&mut self.data, &overlay.data);
        match (self.case.as_mut(), &overlay.case) {
            (Some(base), Some(overlay)) => {
                for (key, value) in overlay {
                    base.insert(key.clone(), value.clone());
                }
            }
            (None, Some(overlay)) => self.case = Some(overlay.clone()),
            _ => {}
        }
        replace(&mut self.filters, &overlay.filters);
        merge_option(&mut self.switch_filters, &overlay.switch_filters);
        replace(&mut self.element_process, &overlay.element_process);
    }
}

impl Merge for RowsQuery {
    fn merge_from(&mut self, overlay: &Self) {
        if !overlay.selector.is_empty() {
            self.selector = overlay.selector.clone();
        }
        replace(&mut self.merge, &overlay.merge);
        replace(&mut self.filter, &overlay.filter);
    }
}

impl Merge for SearchSelectors {
    fn merge_from(&mut self, overlay: &Self) {
        merge_option(&mut self.rows, &overlay.rows);
        replace(&mut self.tags, &overlay.tags);
        self.fields.merge_from(&overlay.fields);
    }
}

impl Merge for AdvanceKeywordConfig {
    fn merge_from(&mut self, overlay: &Self) {
        self.enabled = overlay.enabled;
        merge_option(&mut self.request_config, &overlay.request_config);
        replace(
            &mut self.request_config_transformer,
            &overlay.request_config_transformer,
        );
    }
}

impl Merge for SearchEntry {
    fn merge_from(&mut self, overlay: &Self) {
        replace(&mut self.merge, &overlay.merge);
        merge_option(&mut self.request_config, &overlay.request_config);
        replace(&mut self.keyword_path, &overlay.keyword_path);
        merge_option(&mut self.selectors, &overlay.selectors);
        merge_option(
            &mut self.advance_keyword_params,
            &overlay.advance_keyword_params,
        );
        replace(
            &mut self.request_config_transformer,
            &overlay.request_config_transformer,
        );
    }
}

impl Merge for DetailEntry {
    fn merge_from(&mut self, overlay: &Self) {
        merge_option(&mut self.request_config, &overlay.request_config);
        self.selectors.merge_from(&overlay.selectors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: serde_json::Value) -> SearchEntry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_field_query_overlay_keeps_filters() {
        let base = entry(json!({
            "selectors": {
                "rows": { "selector": "tr" },
                "size": { "selector": "td.size", "filters": [{ "name": "parseSize" }] }
            }
        }));
        let overlay = entry(json!({
            "selectors": { "size": { "selector": "td:nth-child(5)" } }
        }));

        let merged = base.merged(&overlay);
        let size = merged.field_query("size").unwrap();
        assert_eq!(size.selector_list(), ["td:nth-child(5)".to_string()]);
        assert_eq!(size.filters.as_ref().map(Vec::len), Some(1));
        assert_eq!(merged.selectors.unwrap().rows.unwrap().selector, "tr");
    }

    #[test]
    fn test_request_config_deep_merge() {
        let base = entry(json!({
            "requestConfig": { "url": "/torrents.php", "params": { "incldead": 1 } }
        }));
        let overlay = entry(json!({
            "requestConfig": { "params": { "search_area": 4 } }
        }));

        let merged = base.merged(&overlay);
        let params = merged.request_config.unwrap().params.unwrap();
        assert_eq!(params["incldead"], json!(1));
        assert_eq!(params["search_area"], json!(4));
    }

    #[test]
    fn test_advance_keyword_overlay_disables() {
        let base = entry(json!({ "advanceKeywordParams": { "imdb": { "requestConfig": { "params": { "a": 1 } } } } }));
        let overlay = entry(json!({ "advanceKeywordParams": { "imdb": false } }));

        let merged = base.merged(&overlay);
        let imdb = &merged.advance_keyword_params.unwrap()["imdb"];
        assert!(!imdb.enabled);
        assert!(imdb.request_config.is_some());
    }
}
