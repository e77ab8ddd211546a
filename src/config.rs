// src/config.rs

//! Configuration loading utilities.
//!
//! This module provides convenience functions for loading the application
//! config, site definitions and per-user site settings from files.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{Config, SiteMetadata, SiteUserConfig};

const SITE_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Load configuration from a TOML file.
///
/// Falls back to defaults if loading fails.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    config.validate()?;
    Ok(config)
}

/// Find a site definition: an existing file path, or `<sites_dir>/<id>.toml`
/// (then `.json`).
pub fn resolve_site_path(config: &Config, site: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(site);
    if direct.is_file() {
        return Ok(direct);
    }

    SITE_EXTENSIONS
        .iter()
        .map(|ext| config.search.sites_dir.join(format!("{site}.{ext}")))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            AppError::config(format!(
                "site '{}' not found as a file or in {}",
                site,
                config.search.sites_dir.display()
            ))
        })
}

/// Load and validate a site definition by path or id.
pub fn load_site(config: &Config, site: &str) -> Result<SiteMetadata> {
    let path = resolve_site_path(config, site)?;
    log::debug!("Loading site definition from {}", path.display());
    let metadata = SiteMetadata::load(&path)?;
    metadata
        .validate()
        .map_err(|e| AppError::config(format!("Invalid site {}: {e}", path.display())))?;
    Ok(metadata)
}

/// Load user settings for a site; no file means no overrides.
pub fn load_user_config(path: Option<&Path>) -> Result<SiteUserConfig> {
    match path {
        Some(path) => SiteUserConfig::load(path),
        None => Ok(SiteUserConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SITE: &str = r#"
id = "demo"
urls = ["https://demo.example/"]

[search.selectors.rows]
selector = "table.torrents > tbody > tr"

[search.selectors.title]
selector = "a.name"
"#;

    fn config_for(dir: &Path) -> Config {
        let mut config = Config::default();
        config.search.sites_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_load_site_by_id() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("demo.toml"), SITE).unwrap();

        let site = load_site(&config_for(dir.path()), "demo").unwrap();
        assert_eq!(site.id, "demo");
    }

    #[test]
    fn test_load_site_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, SITE).unwrap();

        let site = load_site(&Config::default(), path.to_str().unwrap()).unwrap();
        assert_eq!(site.urls, vec!["https://demo.example/".to_string()]);
    }

    #[test]
    fn test_missing_site() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_site(&config_for(dir.path()), "nowhere");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_site_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("broken.json"),
            r#"{ "id": "broken", "urls": ["https://b.example/"], "search": {} }"#,
        )
        .unwrap();
        let result = load_site(&config_for(dir.path()), "broken");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_user_config() {
        assert!(load_user_config(None).unwrap().url.is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.user.toml");
        fs::write(&path, "url = \"https://mirror.example/\"\nisOffline = false\n").unwrap();
        let user = load_user_config(Some(&path)).unwrap();
        assert_eq!(user.url.as_deref(), Some("https://mirror.example/"));
        assert_eq!(user.is_offline, Some(false));
    }
}
