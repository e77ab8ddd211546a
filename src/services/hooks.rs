// src/services/hooks.rs

//! Per-site code attached to an engine.
//!
//! Site files only carry data. Anything that has to run code (a field
//! override, a record fix-up, the login check) is registered here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::Result;
use crate::models::{Record, RecordDraft, Response, SearchInput};
use crate::services::extractor;
use crate::services::rows::Row;

type FieldParserFn =
    dyn Fn(RecordDraft, &Row<'_>, &SearchInput) -> Result<RecordDraft> + Send + Sync;
type RecordFixFn = dyn Fn(Record, &Row<'_>, &SearchInput) -> Record + Send + Sync;
type LoggedCheckFn = dyn Fn(&Response) -> bool + Send + Sync;
type DisplayLinkFn = dyn Fn(&Record) -> Option<String> + Send + Sync;

/// Capability table consulted while searching one site.
///
/// A field parser receives the whole draft and returns it, so one parser may
/// fill several fields. Fields without a parser use their declared query.
#[derive(Clone)]
pub struct SiteHooks {
    field_parsers: HashMap<String, Arc<FieldParserFn>>,
    fix_record: Option<Arc<RecordFixFn>>,
    logged_check: Option<Arc<LoggedCheckFn>>,
    display_link: Option<Arc<DisplayLinkFn>>,
}

impl Default for SiteHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteHooks {
    /// Hooks with only the built-in `tags` parser.
    pub fn new() -> Self {
        Self {
            field_parsers: HashMap::new(),
            fix_record: None,
            logged_check: None,
            display_link: None,
        }
        .with_field_parser("tags", parse_tags)
    }

    /// Override how `field` is resolved.
    pub fn with_field_parser<F>(mut self, field: impl Into<String>, parser: F) -> Self
    where
        F: Fn(RecordDraft, &Row<'_>, &SearchInput) -> Result<RecordDraft> + Send + Sync + 'static,
    {
        self.field_parsers.insert(field.into(), Arc::new(parser));
        self
    }

    /// Rewrite each record after normalization.
    pub fn with_fix_record<F>(mut self, fix: F) -> Self
    where
        F: Fn(Record, &Row<'_>, &SearchInput) -> Record + Send + Sync + 'static,
    {
        self.fix_record = Some(Arc::new(fix));
        self
    }

    /// Decide from a response whether the session is logged in.
    pub fn with_logged_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.logged_check = Some(Arc::new(check));
        self
    }

    pub fn with_display_link<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Record) -> Option<String> + Send + Sync + 'static,
    {
        self.display_link = Some(Arc::new(resolve));
        self
    }

    pub fn has_field_parser(&self, field: &str) -> bool {
        self.field_parsers.contains_key(field)
    }

    /// Run the parser registered for `field`; without one the draft is returned unchanged.
    pub(crate) fn parse_field(
        &self,
        field: &str,
        draft: RecordDraft,
        row: &Row<'_>,
        input: &SearchInput,
    ) -> Result<RecordDraft> {
        match self.field_parsers.get(field) {
            Some(parser) => parser(draft, row, input),
            None => Ok(draft),
        }
    }

    pub(crate) fn fix_record(&self, record: Record, row: &Row<'_>, input: &SearchInput) -> Record {
        match &self.fix_record {
            Some(fix) => fix(record, row, input),
            None => record,
        }
    }

    /// Public sites are always logged in.
    pub(crate) fn is_logged_in(&self, response: &Response) -> bool {
        self.logged_check
            .as_ref()
            .is_none_or(|check| check(response))
    }

    pub(crate) fn display_link(&self, record: &Record) -> Option<String> {
        match &self.display_link {
            Some(resolve) => resolve(record),
            None => record.url.clone(),
        }
    }
}

impl fmt::Debug for SiteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&str> = self.field_parsers.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("SiteHooks")
            .field("field_parsers", &fields)
            .field("fix_record", &self.fix_record.is_some())
            .field("logged_check", &self.logged_check.is_some())
            .field("display_link", &self.display_link.is_some())
            .finish()
    }
}

/// Built-in `tags` parser: one `{ name }` per declared tag present in the row.
pub fn parse_tags(mut draft: RecordDraft, row: &Row<'_>, input: &SearchInput) -> Result<RecordDraft> {
    let Some(tags) = input
        .search_entry
        .selectors
        .as_ref()
        .and_then(|selectors| selectors.tags.as_ref())
    else {
        return Ok(draft);
    };

    let root = row.root();
    let mut found = Vec::new();
    for tag in tags {
        if extractor::exists(root, &tag.selector)? {
            found.push(json!({ "name": tag.name }));
        }
    }
    draft.insert("tags".to_string(), Value::Array(found));
    Ok(draft)
}
