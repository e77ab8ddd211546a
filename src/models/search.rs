//! Search entries, keyword rules, and the result envelope.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{FieldQuery, Record, RequestConfig, SearchSelectors};

type TransformFn = dyn Fn(&SearchInput) -> RequestConfig + Send + Sync;

/// Rewrites the request config just before it is sent.
#[derive(Clone)]
pub struct RequestTransform(Arc<TransformFn>);

impl RequestTransform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SearchInput) -> RequestConfig + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, input: &SearchInput) -> RequestConfig {
        (self.0)(input)
    }
}

impl fmt::Debug for RequestTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestTransform(<fn>)")
    }
}

/// Request-building branch selected by a `<token>|` keyword prefix.
///
/// A bare `false` in a site file is read as a disabled branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "AdvanceKeywordRepr")]
#[serde(rename_all = "camelCase")]
pub struct AdvanceKeywordConfig {
    #[serde(default = "enabled_default")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_config: Option<RequestConfig>,

    #[serde(skip)]
    pub request_config_transformer: Option<RequestTransform>,
}

impl Default for AdvanceKeywordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_config: None,
            request_config_transformer: None,
        }
    }
}

impl AdvanceKeywordConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_request_config(mut self, config: RequestConfig) -> Self {
        self.request_config = Some(config);
        self
    }

    pub fn with_transformer(mut self, transform: RequestTransform) -> Self {
        self.request_config_transformer = Some(transform);
        self
    }
}

fn enabled_default() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AdvanceKeywordRepr {
    Flag(bool),
    Config {
        #[serde(default = "enabled_default")]
        enabled: bool,
        #[serde(default, rename = "requestConfig")]
        request_config: Option<RequestConfig>,
    },
}

impl From<AdvanceKeywordRepr> for AdvanceKeywordConfig {
    fn from(repr: AdvanceKeywordRepr) -> Self {
        match repr {
            AdvanceKeywordRepr::Flag(enabled) => Self {
                enabled,
                ..Self::default()
            },
            AdvanceKeywordRepr::Config {
                enabled,
                request_config,
            } => Self {
                enabled,
                request_config,
                request_config_transformer: None,
            },
        }
    }
}

/// Everything needed to search one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    /// `Some(false)` stops a caller-supplied entry from being merged over the site default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_config: Option<RequestConfig>,

    /// Where the keyword is written in the request config (default `params.keywords`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<SearchSelectors>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_keyword_params: Option<IndexMap<String, AdvanceKeywordConfig>>,

    #[serde(skip)]
    pub request_config_transformer: Option<RequestTransform>,
}

impl SearchEntry {
    pub const DEFAULT_KEYWORD_PATH: &'static str = "params.keywords";

    pub fn keyword_path(&self) -> &str {
        self.keyword_path
            .as_deref()
            .unwrap_or(Self::DEFAULT_KEYWORD_PATH)
    }

    pub fn field_query(&self, field: &str) -> Option<&FieldQuery> {
        self.selectors.as_ref()?.fields.get(field)
    }

    /// True when nothing at all is set, which always merges over the default.
    pub fn is_empty(&self) -> bool {
        self.merge.is_none()
            && self.request_config.is_none()
            && self.keyword_path.is_none()
            && self.selectors.is_none()
            && self.advance_keyword_params.is_none()
            && self.request_config_transformer.is_none()
    }

    pub fn with_request_config(mut self, config: RequestConfig) -> Self {
        self.request_config = Some(config);
        self
    }

    pub fn with_selectors(mut self, selectors: SearchSelectors) -> Self {
        self.selectors = Some(selectors);
        self
    }

    pub fn with_keyword_path(mut self, keyword_path: impl Into<String>) -> Self {
        self.keyword_path = Some(keyword_path.into());
        self
    }

    pub fn with_advance_keyword(
        mut self,
        token: impl Into<String>,
        config: AdvanceKeywordConfig,
    ) -> Self {
        self.advance_keyword_params
            .get_or_insert_with(IndexMap::new)
            .insert(token.into(), config);
        self
    }

    pub fn with_transformer(mut self, transform: RequestTransform) -> Self {
        self.request_config_transformer = Some(transform);
        self
    }

    pub fn without_merge(mut self) -> Self {
        self.merge = Some(false);
        self
    }
}

/// The triple handed to transformers and extraction hooks.
#[derive(Debug, Clone)]
pub struct SearchInput {
    pub keywords: Option<String>,
    pub search_entry: SearchEntry,
    pub request_config: RequestConfig,
}

/// Detail-page extraction used to resolve missing download links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_config: Option<RequestConfig>,

    #[serde(default)]
    pub selectors: IndexMap<String, FieldQuery>,
}

/// Terminal status of one search call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchStatus {
    #[default]
    UnknownError,
    PassSearch,
    NeedLogin,
    NoResults,
    ParseError,
    Success,
}

/// Records plus the status that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub data: Vec<Record>,
    pub status: SearchStatus,
}

impl SearchResult {
    pub fn with_status(status: SearchStatus) -> Self {
        Self {
            data: Vec::new(),
            status,
        }
    }
}
