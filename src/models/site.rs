//! Site definitions and per-user overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::merge::Merge;
use crate::models::{DetailEntry, SearchEntry};

/// Default timezone offset of timestamps found on a site.
pub const DEFAULT_TIMEZONE_OFFSET: &str = "+0000";

/// Static description of one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMetadata {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Known base addresses, the first one being the default.
    #[serde(default)]
    pub urls: Vec<String>,

    /// Offset such as `+0800` applied to naive timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailEntry>,
}

impl SiteMetadata {
    /// Load a site definition from a TOML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Ok(toml::from_str(&content)?),
        }
    }

    pub fn timezone_offset(&self) -> &str {
        self.timezone_offset
            .as_deref()
            .unwrap_or(DEFAULT_TIMEZONE_OFFSET)
    }

    /// Check the parts every search depends on.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation("site id is empty"));
        }
        if self.urls.is_empty() {
            return Err(AppError::validation(format!(
                "site '{}' declares no urls",
                self.id
            )));
        }
        for url in &self.urls {
            url::Url::parse(url)?;
        }
        if let Some(search) = &self.search {
            let has_rows = search
                .selectors
                .as_ref()
                .and_then(|s| s.rows.as_ref())
                .is_some_and(|rows| !rows.selector.is_empty());
            if !has_rows {
                return Err(AppError::config(format!(
                    "site '{}' has a search entry without a rows selector",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Partial site definition layered over the shipped one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailEntry>,
}

impl SiteMetadata {
    /// Apply a user overlay, field by field.
    pub fn with_override(mut self, overlay: &SiteOverride) -> Self {
        if let Some(name) = &overlay.name {
            self.name = Some(name.clone());
        }
        if let Some(urls) = &overlay.urls {
            self.urls = urls.clone();
        }
        if let Some(offset) = &overlay.timezone_offset {
            self.timezone_offset = Some(offset.clone());
        }
        match (self.search.as_mut(), &overlay.search) {
            (Some(base), Some(search)) => base.merge_from(search),
            (None, Some(search)) => self.search = Some(search.clone()),
            _ => {}
        }
        match (self.detail.as_mut(), &overlay.detail) {
            (Some(base), Some(detail)) => base.merge_from(detail),
            (None, Some(detail)) => self.detail = Some(detail.clone()),
            _ => {}
        }
        self
    }
}

/// What a user can change about a site without editing its definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteUserConfig {
    /// Replaces the default base address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_offline: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_search: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<SiteOverride>,
}

impl SiteUserConfig {
    /// Load user overrides from a TOML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Ok(toml::from_str(&content)?),
        }
    }
}
