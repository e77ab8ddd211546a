// src/pipeline/validate.rs

use serde::Serialize;

use crate::config::load_site;
use crate::error::{AppError, Result};
use crate::models::{
    Config, FieldQuery, ResponseType, SELF_SELECTOR, SearchEntry, SiteMetadata, ValueFilter,
};
use crate::services::{extractor, filters};

/// Summary of a checked site definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub site_id: String,
    /// Search fields declared, `tags` included.
    pub fields: usize,
    /// CSS selectors that were compiled.
    pub selectors: usize,
    /// Filter names with no registered implementation.
    pub unknown_filters: Vec<String>,
}

/// Load a site and check its selectors without sending requests.
pub fn run_validate(config: &Config, site: &str) -> Result<ValidationReport> {
    log::info!("Validating site definition '{site}'");

    match load_site(config, site).and_then(|metadata| validate_site(&metadata)) {
        Ok(report) => {
            log::info!("Site '{}' is valid", report.site_id);
            log::info!("  fields: {}", report.fields);
            log::info!("  selectors compiled: {}", report.selectors);
            for name in &report.unknown_filters {
                log::warn!("  unknown filter '{name}' passes values through");
            }
            Ok(report)
        }
        Err(e) => {
            log::error!("Validation failed: {e}");
            Err(e)
        }
    }
}

/// Compile every CSS selector of a loaded site.
///
/// JSON sites address fields by object path, so only their filters are
/// checked.
pub fn validate_site(site: &SiteMetadata) -> Result<ValidationReport> {
    site.validate()?;

    let mut checker = Checker::default();
    if let Some(search) = &site.search {
        checker.search_entry(search)?;
    }
    if let Some(detail) = &site.detail {
        let css = detail
            .request_config
            .as_ref()
            .is_none_or(|c| c.response_type() == ResponseType::Document);
        for query in detail.selectors.values() {
            checker.field(query, css)?;
        }
    }

    Ok(ValidationReport {
        site_id: site.id.clone(),
        fields: checker.fields,
        selectors: checker.selectors,
        unknown_filters: checker.unknown_filters,
    })
}

#[derive(Default)]
struct Checker {
    fields: usize,
    selectors: usize,
    unknown_filters: Vec<String>,
}

impl Checker {
    fn search_entry(&mut self, entry: &SearchEntry) -> Result<()> {
        let css = entry
            .request_config
            .as_ref()
            .is_none_or(|c| c.response_type() == ResponseType::Document);
        let Some(selectors) = &entry.selectors else {
            return Ok(());
        };

        if let Some(rows) = &selectors.rows {
            if rows.merge == Some(0) {
                return Err(AppError::config("rows.merge must be at least 1"));
            }
            if css {
                self.compile(&rows.selector)?;
            }
        }
        for query in selectors.fields.values() {
            self.fields += 1;
            self.field(query, css)?;
        }
        if let Some(tags) = &selectors.tags {
            self.fields += 1;
            for tag in tags {
                if css {
                    self.compile(&tag.selector)?;
                }
            }
        }
        Ok(())
    }

    fn field(&mut self, query: &FieldQuery, css: bool) -> Result<()> {
        if css {
            for selector in query.selector_list() {
                self.compile(selector)?;
            }
            for matcher in query.case.iter().flat_map(|case| case.keys()) {
                self.compile(matcher)?;
            }
        }

        let chains = query
            .filters
            .iter()
            .chain(query.switch_filters.iter().flat_map(|s| s.values()));
        for filter in chains.flatten() {
            if let ValueFilter::Named(named) = filter {
                if !filters::is_registered(&named.name) && !self.unknown_filters.contains(&named.name) {
                    self.unknown_filters.push(named.name.clone());
                }
            }
        }
        Ok(())
    }

    fn compile(&mut self, selector: &str) -> Result<()> {
        if selector == SELF_SELECTOR {
            return Ok(());
        }
        extractor::parse_selector(selector)?;
        self.selectors += 1;
        Ok(())
    }
}
