// src/models/mod.rs

//! Domain models for the search engine.
//!
//! Plain data: application config, site definitions, search entries and
//! their queries, request templates, and the records a search produces.

mod config;
pub mod merge;
mod query;
mod record;
pub mod request;
mod search;
mod site;

// Re-export all public types
pub use config::{Config, HttpConfig, LoggingConfig, SearchConfig};
pub use merge::Merge;
pub use query::{
    ElementProcess, FieldQuery, NamedFilter, RowsFilter, RowsQuery, SELF_SELECTOR,
    SearchSelectors, TagQuery, ValueFilter,
};
pub use record::{DEFAULT_RECORD_FIELDS, Record, RecordDraft, Tag};
pub use request::{RawResponse, RequestConfig, Response, ResponseData, ResponseType};
pub use search::{
    AdvanceKeywordConfig, DetailEntry, RequestTransform, SearchEntry, SearchInput, SearchResult,
    SearchStatus,
};
pub use site::{DEFAULT_TIMEZONE_OFFSET, SiteMetadata, SiteOverride, SiteUserConfig};
