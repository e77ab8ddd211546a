// src/pipeline/search.rs

use std::path::Path;
use std::sync::Arc;

use crate::config::{load_site, load_user_config};
use crate::error::Result;
use crate::models::{Config, SearchEntry, SearchResult};
use crate::services::SiteEngine;
use crate::utils::http::ReqwestTransport;

/// Build an engine for `site` (a file path or an id under `sites_dir`) with
/// the reqwest transport.
pub fn build_engine(config: &Config, site: &str, user: Option<&Path>) -> Result<SiteEngine> {
    let metadata = load_site(config, site)?;
    let user_config = load_user_config(user)?;
    let transport = ReqwestTransport::new(&config.http)?;
    Ok(SiteEngine::new(metadata, user_config, Arc::new(transport)))
}

/// Search one site with its default entry.
pub async fn run_search(
    config: &Config,
    site: &str,
    user: Option<&Path>,
    keywords: Option<&str>,
) -> Result<SearchResult> {
    let engine = build_engine(config, site, user)?;
    log::info!(
        "Searching site '{}' at {} for {:?}",
        engine.metadata().id,
        engine.url(),
        keywords.unwrap_or_default()
    );
    engine.search(keywords, SearchEntry::default()).await
}
