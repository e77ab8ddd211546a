// src/services/assembler.rs

//! Record assembler.
//!
//! Turns one row into a [`Record`]: resolve every field, normalize the
//! well-known ones, then hand the result to the site's fix-up hook.

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{DEFAULT_RECORD_FIELDS, Record, RecordDraft, SearchInput};
use crate::services::extractor;
use crate::services::hooks::SiteHooks;
use crate::services::rows::Row;
use crate::utils::fix_link;
use crate::utils::parse::{number_value, parse_size, parse_time_with_zone, to_number};

/// Fields coerced to numbers whenever they look numeric.
const NUMERIC_FIELDS: [&str; 6] = ["seeders", "leechers", "completed", "comments", "category", "status"];

/// Optional fields where an empty string means "not found".
const OPTIONAL_FIELDS: [&str; 14] = [
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
    "progress",
    "status",
];

/// Assembles records for one site.
#[derive(Debug, Clone, Copy)]
pub struct RecordAssembler<'s> {
    site_id: &'s str,
    base_url: &'s str,
    timezone_offset: &'s str,
    hooks: &'s SiteHooks,
}

impl<'s> RecordAssembler<'s> {
    /// `base_url` resolves relative links when the request config has no base.
    pub fn new(
        site_id: &'s str,
        base_url: &'s str,
        timezone_offset: &'s str,
        hooks: &'s SiteHooks,
    ) -> Self {
        Self {
            site_id,
            base_url,
            timezone_offset,
            hooks,
        }
    }

    /// Build a record from `row`. Fields already in `seed` are kept as is.
    pub fn assemble(&self, seed: RecordDraft, row: &Row<'_>, input: &SearchInput) -> Result<Record> {
        let mut draft = seed;

        for field in candidate_fields(input) {
            if draft.contains_key(field) {
                continue;
            }
            if self.hooks.has_field_parser(field) {
                draft = self.hooks.parse_field(field, draft, row, input)?;
            } else if let Some(query) = input.search_entry.field_query(field) {
                let value = extractor::extract(row.root(), query)?;
                draft.insert(field.to_string(), value);
            }
        }

        self.normalize(&mut draft, input)?;

        let record: Record = serde_json::from_value(Value::Object(draft))
            .map_err(|e| AppError::parse(format!("cannot assemble record: {e}")))?;
        Ok(self.hooks.fix_record(record, row, input))
    }

    fn normalize(&self, draft: &mut RecordDraft, input: &SearchInput) -> Result<()> {
        for field in OPTIONAL_FIELDS {
            if draft.get(field).is_some_and(is_absent) {
                draft.remove(field);
            }
        }

        if draft.get("site").is_none_or(is_absent) {
            draft.insert("site".to_string(), Value::String(self.site_id.to_string()));
        }

        if draft.get("id").is_none_or(is_absent) {
            let fallback = ["url", "link"]
                .iter()
                .find_map(|key| draft.get(*key).filter(|v| !is_absent(v)).cloned())
                .unwrap_or(Value::Null);
            draft.insert("id".to_string(), to_number(fallback));
        }

        let base_url = input
            .request_config
            .base_url
            .as_deref()
            .unwrap_or(self.base_url);
        for key in ["url", "link"] {
            if let Some(value) = draft.remove(key) {
                let fixed = fix_link(&as_text(&value), base_url);
                if !fixed.is_empty() {
                    draft.insert(key.to_string(), Value::String(fixed));
                }
            }
        }

        if let Some(size) = draft.remove("size") {
            let size = match size.as_str().and_then(parse_size) {
                Some(bytes) => number_value(bytes),
                None => size,
            };
            draft.insert("size".to_string(), to_number(size));
        }

        for key in NUMERIC_FIELDS {
            if let Some(value) = draft.remove(key) {
                draft.insert(key.to_string(), to_number(value));
            }
        }

        if let Some(time) = draft.remove("time") {
            match parse_time_with_zone(&time, self.timezone_offset) {
                Some(instant) => {
                    draft.insert("time".to_string(), Value::String(instant.to_rfc3339()));
                }
                None => log::debug!("Dropping unparseable time {}", time),
            }
        }

        if draft.get("tags").is_some_and(|tags| !tags.is_array()) {
            draft.remove("tags");
        }

        Ok(())
    }
}

/// Declared fields first, then the defaults not already declared.
fn candidate_fields(input: &SearchInput) -> Vec<&str> {
    let mut fields = input
        .search_entry
        .selectors
        .as_ref()
        .map(|selectors| selectors.declared_fields())
        .unwrap_or_default();
    for field in DEFAULT_RECORD_FIELDS {
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
