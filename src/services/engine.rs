// src/services/engine.rs

//! Search pipeline for one site.
//!
//! A [`SiteEngine`] owns the merged site definition, the user's settings, the
//! injected transport and the site's hooks. `search` never fails at runtime:
//! every request or parsing failure ends up as a status on the result. Only a
//! broken site definition is returned as an error.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    AdvanceKeywordConfig, Merge, Record, RecordDraft, RequestConfig, Response, ResponseData,
    ResponseType, SearchEntry, SearchInput, SearchResult, SearchStatus, SiteMetadata,
    SiteUserConfig,
};
use crate::services::assembler::RecordAssembler;
use crate::services::extractor::{self, Root};
use crate::services::gateway::RequestGateway;
use crate::services::hooks::SiteHooks;
use crate::services::rows::extract_rows;
use crate::utils::fix_link;
use crate::utils::http::HttpTransport;

/// Searches one configured site.
pub struct SiteEngine {
    metadata: SiteMetadata,
    user_config: SiteUserConfig,
    transport: Arc<dyn HttpTransport>,
    hooks: SiteHooks,
}

impl SiteEngine {
    /// The user's `merge` overlay is applied to `metadata` here, once.
    pub fn new(
        metadata: SiteMetadata,
        user_config: SiteUserConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let metadata = match &user_config.merge {
            Some(overlay) => metadata.with_override(overlay),
            None => metadata,
        };
        Self {
            metadata,
            user_config,
            transport,
            hooks: SiteHooks::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: SiteHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn metadata(&self) -> &SiteMetadata {
        &self.metadata
    }

    /// Active base address: the user's override, else the first declared URL.
    pub fn url(&self) -> &str {
        self.user_config
            .url
            .as_deref()
            .or_else(|| self.metadata.urls.first().map(String::as_str))
            .unwrap_or_default()
    }

    pub fn is_online(&self) -> bool {
        !self.user_config.is_offline.unwrap_or(false)
    }

    pub fn allow_search(&self) -> bool {
        self.is_online()
            && self.metadata.search.is_some()
            && self.user_config.allow_search != Some(false)
    }

    fn gateway(&self) -> RequestGateway<'_> {
        RequestGateway::new(self.transport.as_ref(), self.url(), &self.hooks)
    }

    /// Send a request on behalf of this site.
    pub async fn request(&self, config: RequestConfig, check_login: bool) -> Result<Response> {
        self.gateway().request(config, check_login).await
    }

    /// Search the site.
    ///
    /// `entry` is merged over the site's own search entry unless it sets
    /// `merge = false`. A `<token>|` prefix on `keywords` selects the matching
    /// advanced keyword branch.
    pub async fn search(&self, keywords: Option<&str>, entry: SearchEntry) -> Result<SearchResult> {
        if !self.allow_search() {
            log::debug!("Search skipped for site '{}'", self.metadata.id);
            return Ok(SearchResult::with_status(SearchStatus::PassSearch));
        }

        let entry = self.compose_entry(entry);
        if entry
            .selectors
            .as_ref()
            .and_then(|selectors| selectors.rows.as_ref())
            .is_none_or(|rows| rows.selector.is_empty())
        {
            return Err(AppError::config(format!(
                "site '{}' has no rows selector",
                self.metadata.id
            )));
        }

        let Some(input) = self.prepare_request(keywords, entry)? else {
            return Ok(SearchResult::with_status(SearchStatus::PassSearch));
        };

        let response = match self.request(input.request_config.clone(), true).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Search request for site '{}' failed: {}", self.metadata.id, e);
                return Ok(SearchResult::with_status(e.search_status()));
            }
        };

        match self.parse_search_page(&response, &input) {
            Ok(data) => {
                log::info!("Site '{}' returned {} records", self.metadata.id, data.len());
                Ok(SearchResult {
                    data,
                    status: SearchStatus::Success,
                })
            }
            Err(e) => {
                log::warn!("Search page of site '{}' not parsed: {}", self.metadata.id, e);
                Ok(SearchResult::with_status(e.search_status()))
            }
        }
    }

    fn compose_entry(&self, entry: SearchEntry) -> SearchEntry {
        if entry.is_empty() || entry.merge != Some(false) {
            self.metadata
                .search
                .clone()
                .unwrap_or_default()
                .merged(&entry)
        } else {
            entry
        }
    }

    /// Build the request for `keywords`. `None` means a disabled advanced
    /// keyword branch matched and the search is skipped.
    fn prepare_request(&self, keywords: Option<&str>, entry: SearchEntry) -> Result<Option<SearchInput>> {
        let mut request_config = RequestConfig::search_default();
        if let Some(config) = &entry.request_config {
            request_config = request_config.merged(config)?;
        }

        let mut keywords = keywords.map(str::to_string);
        let advance = match (keywords.as_deref(), &entry.advance_keyword_params) {
            (Some(raw), Some(params)) => params.iter().find_map(|(token, config)| {
                let rest = raw.strip_prefix(token.as_str())?.strip_prefix('|')?;
                Some((token.clone(), config.clone(), rest.to_string()))
            }),
            _ => None,
        };

        let advance: Option<AdvanceKeywordConfig> = match advance {
            Some((token, config, _)) if !config.enabled => {
                log::debug!("Advanced keyword '{}' disabled for site '{}'", token, self.metadata.id);
                return Ok(None);
            }
            Some((_, config, rest)) => {
                keywords = Some(rest);
                Some(config)
            }
            None => None,
        };

        if let Some(keyword) = keywords.as_deref().filter(|k| !k.is_empty()) {
            request_config.set_path(entry.keyword_path(), Value::String(keyword.to_string()))?;
        }

        let mut input = SearchInput {
            keywords,
            search_entry: entry,
            request_config,
        };

        if let Some(advance) = advance {
            if let Some(config) = &advance.request_config {
                input.request_config = input.request_config.merged(config)?;
            }
            if let Some(transform) = &advance.request_config_transformer {
                input.request_config = transform.call(&input);
            }
        }

        if let Some(transform) = input.search_entry.request_config_transformer.clone() {
            input.request_config = transform.call(&input);
        }

        Ok(Some(input))
    }

    fn parse_search_page(&self, response: &Response, input: &SearchInput) -> Result<Vec<Record>> {
        let rows_query = input
            .search_entry
            .selectors
            .as_ref()
            .and_then(|selectors| selectors.rows.as_ref())
            .ok_or_else(|| AppError::config("rows selector missing"))?;

        let rows = match &response.data {
            ResponseData::Document(html) => extract_rows(Root::Node(html.root_element()), rows_query)?,
            ResponseData::Json(body) => extract_rows(Root::Object(body), rows_query)?,
            ResponseData::Text(_) => {
                return Err(AppError::parse("a text response holds no rows"));
            }
        };

        let assembler = RecordAssembler::new(
            &self.metadata.id,
            self.url(),
            self.metadata.timezone_offset(),
            &self.hooks,
        );
        rows.iter()
            .map(|row| assembler.assemble(RecordDraft::new(), row, input))
            .collect()
    }

    /// The record's download address, fetching its detail page when the
    /// search row carried none.
    pub async fn resolve_download_link(&self, record: &Record) -> Result<Option<String>> {
        if record.link.is_some() {
            return Ok(record.link.clone());
        }
        let Some(detail) = &self.metadata.detail else {
            return Ok(None);
        };
        let (Some(query), Some(url)) = (detail.selectors.get("link"), record.url.as_ref()) else {
            return Ok(None);
        };

        let mut config = detail.request_config.clone().unwrap_or_default();
        config.url = Some(url.clone());
        config.response_type.get_or_insert(ResponseType::Document);

        let response = self.request(config, true).await?;
        let link = match &response.data {
            ResponseData::Document(html) => extractor::extract(Root::Node(html.root_element()), query)?,
            ResponseData::Json(body) => extractor::extract(Root::Object(body), query)?,
            ResponseData::Text(_) => {
                return Err(AppError::parse("a text response holds no link"));
            }
        };

        let link = match link {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let link = fix_link(&link, self.url());
        Ok((!link.is_empty()).then_some(link))
    }

    /// Address shown to the user for a record; the detail page unless a hook says otherwise.
    pub fn resolve_display_link(&self, record: &Record) -> Option<String> {
        self.hooks.display_link(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestTransform, SearchSelectors};
    use crate::services::stub::{Reply, StubTransport};
    use serde_json::json;

    const PAGE: &str = r#"
        <html><body>
        <table class="torrents"><tbody>
            <tr><td class="name"><a href="details.php?id=1">Ubuntu 24.04</a><img class="free"></td>
                <td class="size">4.5 GB</td><td class="seeders">120</td>
                <td class="time">2024-05-01 08:00:00</td></tr>
            <tr><td class="name"><a href="details.php?id=2">Debian 12</a></td>
                <td class="size">700 MB</td><td class="seeders">45</td>
                <td class="time">2024-05-02 08:00:00</td></tr>
        </tbody></table>
        </body></html>
    "#;

    fn site() -> SiteMetadata {
        serde_json::from_value(json!({
            "id": "demo",
            "urls": ["https://demo.example/"],
            "timezoneOffset": "+0800",
            "search": {
                "requestConfig": { "url": "/torrents.php", "params": { "incldead": 0 } },
                "keywordPath": "params.search",
                "advanceKeywordParams": {
                    "imdb": { "requestConfig": { "params": { "search_area": 4 } } },
                    "douban": false
                },
                "selectors": {
                    "rows": { "selector": "table.torrents > tbody > tr" },
                    "id": { "selector": "td.name a", "attr": "href", "filters": [{ "name": "querystring", "args": ["id"] }] },
                    "title": { "selector": "td.name a" },
                    "url": { "selector": "td.name a", "attr": "href" },
                    "size": { "selector": "td.size" },
                    "seeders": { "selector": "td.seeders" },
                    "time": { "selector": "td.time" },
                    "tags": [{ "name": "Free", "selector": "img.free" }]
                }
            },
            "detail": {
                "selectors": { "link": { "selector": "a.download", "attr": "href" } }
            }
        }))
        .unwrap()
    }

    fn build_engine(reply: Reply) -> (SiteEngine, Arc<StubTransport>) {
        let transport = Arc::new(StubTransport::new(reply));
        let engine = SiteEngine::new(site(), SiteUserConfig::default(), transport.clone());
        (engine, transport)
    }

    #[tokio::test]
    async fn test_search_success() {
        let (engine, transport) = build_engine(Reply::ok(PAGE));
        let result = engine
            .search(Some("ubuntu"), SearchEntry::default())
            .await
            .unwrap();

        assert_eq!(result.status, SearchStatus::Success);
        assert_eq!(result.data.len(), 2);

        let first = &result.data[0];
        assert_eq!(first.site, "demo");
        assert_eq!(first.id, json!(1));
        assert_eq!(first.url.as_deref(), Some("https://demo.example/details.php?id=1"));
        assert_eq!(first.size, Some(json!(4831838208u64)));
        assert_eq!(first.seeders, Some(json!(120)));
        assert_eq!(first.time.unwrap().to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert!(first.has_tag("Free"));
        assert!(result.data[1].tags.is_empty());

        let requests = transport.requests();
        let request = &requests[0];
        assert_eq!(request.url.as_deref(), Some("/torrents.php"));
        assert_eq!(request.base_url.as_deref(), Some("https://demo.example/"));
        let params = request.params.as_ref().unwrap();
        assert_eq!(params["search"], json!("ubuntu"));
        assert_eq!(params["incldead"], json!(0));
    }

    #[tokio::test]
    async fn test_search_merged_rows() {
        let page = r#"<table class="torrents"><tbody>
            <tr><td class="name"><a href="details.php?id=1">A</a></td></tr><tr><td class="seeders">3</td></tr>
            <tr><td class="name"><a href="details.php?id=2">B</a></td></tr><tr><td class="seeders">4</td></tr>
            <tr><td class="name"><a href="details.php?id=3">C</a></td></tr><tr><td class="seeders">5</td></tr>
        </tbody></table>"#;
        let (engine, _) = build_engine(Reply::ok(page));
        let entry: SearchEntry = serde_json::from_value(json!({
            "selectors": { "rows": { "merge": 2 } }
        }))
        .unwrap();

        let result = engine.search(None, entry).await.unwrap();
        assert_eq!(result.status, SearchStatus::Success);
        let seeders: Vec<_> = result.data.iter().map(|r| r.seeders.clone()).collect();
        assert_eq!(seeders, vec![Some(json!(3)), Some(json!(4)), Some(json!(5))]);
        assert_eq!(result.data[2].title, Some(json!("C")));
    }

    #[tokio::test]
    async fn test_search_keeps_rows_without_identity() {
        let page = r#"<table class="torrents">
            <thead><tr><th>Name</th><th>Size</th></tr></thead>
            <tbody><tr><td class="name"><a href="details.php?id=7">Arch</a></td>
                <td class="size">1 GB</td></tr></tbody>
        </table>"#;
        let (engine, _) = build_engine(Reply::ok(page));
        let entry: SearchEntry = serde_json::from_value(json!({
            "selectors": { "rows": { "selector": "table.torrents tr" } }
        }))
        .unwrap();

        let result = engine.search(None, entry).await.unwrap();
        assert_eq!(result.status, SearchStatus::Success);
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.data[0].id, Value::Null);
        assert_eq!(result.data[1].id, json!(7));
        assert_eq!(result.data[1].size, Some(json!(1073741824u64)));
    }

    #[tokio::test]
    async fn test_search_no_results() {
        let (engine, _) = build_engine(Reply::ok("<table class=\"torrents\"><tbody></tbody></table>"));
        let result = engine.search(Some("none"), SearchEntry::default()).await.unwrap();
        assert_eq!(result, SearchResult::with_status(SearchStatus::NoResults));
    }

    #[tokio::test]
    async fn test_search_offline_or_disabled() {
        let transport = Arc::new(StubTransport::new(Reply::ok(PAGE)));
        let offline = SiteUserConfig {
            is_offline: Some(true),
            ..SiteUserConfig::default()
        };
        let engine = SiteEngine::new(site(), offline, transport.clone());
        let result = engine.search(Some("x"), SearchEntry::default()).await.unwrap();
        assert_eq!(result.status, SearchStatus::PassSearch);

        let disabled = SiteUserConfig {
            allow_search: Some(false),
            ..SiteUserConfig::default()
        };
        let engine = SiteEngine::new(site(), disabled, transport.clone());
        let result = engine.search(Some("x"), SearchEntry::default()).await.unwrap();
        assert_eq!(result.status, SearchStatus::PassSearch);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_advance_keyword() {
        let (engine, transport) = build_engine(Reply::ok(PAGE));
        let result = engine
            .search(Some("douban|1292052"), SearchEntry::default())
            .await
            .unwrap();
        assert_eq!(result.status, SearchStatus::PassSearch);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_advance_keyword_strips_prefix() {
        let (engine, transport) = build_engine(Reply::ok(PAGE));
        let result = engine
            .search(Some("imdb|tt1234567"), SearchEntry::default())
            .await
            .unwrap();
        assert_eq!(result.status, SearchStatus::Success);

        let params = transport.requests()[0].params.clone().unwrap();
        assert_eq!(params["search"], json!("tt1234567"));
        assert_eq!(params["search_area"], json!(4));
    }

    #[tokio::test]
    async fn test_transformers_run_in_order() {
        let (engine, transport) = build_engine(Reply::ok(PAGE));
        let advance = AdvanceKeywordConfig::default().with_transformer(RequestTransform::new(|input| {
            let mut config = input.request_config.clone();
            config.url = Some("/advance.php".to_string());
            config
        }));
        let entry = SearchEntry::default()
            .with_advance_keyword("imdb", advance)
            .with_transformer(RequestTransform::new(|input| {
                let mut config = input.request_config.clone();
                let url = config.url.clone().unwrap_or_default();
                config.url = Some(format!("{url}?from=entry"));
                config
            }));

        engine.search(Some("imdb|tt1234567"), entry).await.unwrap();
        let requests = transport.requests();
        let request = &requests[0];
        assert_eq!(request.url.as_deref(), Some("/advance.php?from=entry"));
    }

    #[tokio::test]
    async fn test_need_login() {
        let transport = Arc::new(StubTransport::new(Reply::ok("<form id=\"login\"></form>")));
        let hooks = SiteHooks::new().with_logged_check(|response| match &response.data {
            ResponseData::Document(html) => html
                .select(&extractor::parse_selector("form#login").unwrap())
                .next()
                .is_none(),
            _ => true,
        });
        let engine = SiteEngine::new(site(), SiteUserConfig::default(), transport).with_hooks(hooks);

        let result = engine.search(Some("x"), SearchEntry::default()).await.unwrap();
        assert_eq!(result.status, SearchStatus::NeedLogin);
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn test_http_errors_are_parse_errors() {
        let (engine, _) = build_engine(Reply::status(404, "Not Found", ""));
        let result = engine.search(Some("x"), SearchEntry::default()).await.unwrap();
        assert_eq!(result.status, SearchStatus::ParseError);

        let (engine, _) = build_engine(Reply::Unreachable);
        let result = engine.search(Some("x"), SearchEntry::default()).await.unwrap();
        assert_eq!(result.status, SearchStatus::ParseError);
    }

    #[tokio::test]
    async fn test_missing_rows_is_config_error() {
        let (engine, transport) = build_engine(Reply::ok(PAGE));
        let entry = SearchEntry::default()
            .without_merge()
            .with_selectors(SearchSelectors::default());

        let result = engine.search(Some("x"), entry).await;
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_json_site() {
        let body = r#"{ "data": { "torrents": [
            { "id": 11, "name": "Arch", "size": 1048576, "seeders": "7", "added": 1714550400, "free": true },
            { "id": 12, "name": "Fedora", "size": "2 GB", "seeders": 3, "added": 1714636800 }
        ] } }"#;
        let transport = Arc::new(StubTransport::new(Reply::ok(body)));
        let mut site = site();
        site.search = Some(
            serde_json::from_value(json!({
                "requestConfig": { "url": "/api/torrents", "responseType": "json" },
                "selectors": {
                    "rows": { "selector": "data.torrents" },
                    "id": { "selector": "id" },
                    "title": { "selector": "name" },
                    "size": { "selector": "size" },
                    "seeders": { "selector": "seeders" },
                    "time": { "selector": "added" },
                    "url": { "selector": "id", "filters": [{ "name": "prepend", "args": ["/t/"] }] },
                    "tags": [{ "name": "Free", "selector": "free" }]
                }
            }))
            .unwrap(),
        );
        let engine = SiteEngine::new(site, SiteUserConfig::default(), transport);

        let result = engine.search(Some("linux"), SearchEntry::default()).await.unwrap();
        assert_eq!(result.status, SearchStatus::Success);
        let fedora = &result.data[1];
        assert_eq!(fedora.id, json!(12));
        assert_eq!(fedora.size, Some(json!(2147483648u64)));
        assert_eq!(fedora.url.as_deref(), Some("https://demo.example/t/12"));
        assert_eq!(result.data[0].seeders, Some(json!(7)));
        assert_eq!(result.data[0].time.unwrap().to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(result.data[0].has_tag("Free"));
        assert!(!fedora.has_tag("Free"));
    }

    #[tokio::test]
    async fn test_caller_entry_without_merge() {
        let (engine, transport) = build_engine(Reply::ok(PAGE));
        let entry: SearchEntry = serde_json::from_value(json!({
            "merge": false,
            "requestConfig": { "url": "/browse.php" },
            "selectors": {
                "rows": { "selector": "table.torrents > tbody > tr" },
                "title": { "selector": "td.name a" },
                "url": { "selector": "td.name a", "attr": "href" }
            }
        }))
        .unwrap();

        let result = engine.search(Some("debian"), entry).await.unwrap();
        assert_eq!(result.status, SearchStatus::Success);
        assert_eq!(result.data[1].id, json!("details.php?id=2"));
        assert_eq!(result.data[1].size, None);

        let requests = transport.requests();
        let request = &requests[0];
        assert_eq!(request.url.as_deref(), Some("/browse.php"));
        assert_eq!(request.params.as_ref().unwrap()["keywords"], json!("debian"));
    }

    #[tokio::test]
    async fn test_user_url_and_override() {
        let transport = Arc::new(StubTransport::new(Reply::ok(PAGE)));
        let user: SiteUserConfig = serde_json::from_value(json!({
            "url": "https://mirror.example/",
            "merge": { "search": { "selectors": { "title": { "attr": "href" } } } }
        }))
        .unwrap();
        let engine = SiteEngine::new(site(), user, transport);

        assert_eq!(engine.url(), "https://mirror.example/");
        let result = engine.search(None, SearchEntry::default()).await.unwrap();
        assert_eq!(result.data[0].title, Some(json!("details.php?id=1")));
        assert_eq!(
            result.data[0].url.as_deref(),
            Some("https://mirror.example/details.php?id=1")
        );
    }

    #[tokio::test]
    async fn test_resolve_download_link() {
        let (engine, transport) = build_engine(Reply::ok(
            r#"<a class="download" href="download.php?id=1&amp;passkey=abc">Download</a>"#,
        ));
        let record = Record {
            site: "demo".to_string(),
            id: json!(1),
            url: Some("https://demo.example/details.php?id=1".to_string()),
            ..Record::default()
        };

        let link = engine.resolve_download_link(&record).await.unwrap();
        assert_eq!(
            link.as_deref(),
            Some("https://demo.example/download.php?id=1&passkey=abc")
        );
        assert_eq!(
            transport.requests()[0].url.as_deref(),
            Some("https://demo.example/details.php?id=1")
        );

        let with_link = Record {
            link: Some("magnet:?xt=urn:btih:abc".to_string()),
            ..record.clone()
        };
        assert_eq!(
            engine.resolve_download_link(&with_link).await.unwrap(),
            with_link.link
        );
        assert_eq!(engine.resolve_display_link(&record), record.url);
    }
}
