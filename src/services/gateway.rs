// src/services/gateway.rs

//! Request gateway.
//!
//! Every request a site engine makes goes through here: defaults are filled
//! in, transport failures are classified, bodies are decoded, and the login
//! check runs.

use scraper::Html;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{RawResponse, RequestConfig, Response, ResponseData, ResponseType};
use crate::services::hooks::SiteHooks;
use crate::utils::http::{HttpTransport, request_url};
use crate::utils::parse::unmask_cf_emails;

/// A site's view of the transport.
#[derive(Clone, Copy)]
pub struct RequestGateway<'e> {
    transport: &'e dyn HttpTransport,
    base_url: &'e str,
    hooks: &'e SiteHooks,
}

impl<'e> RequestGateway<'e> {
    pub fn new(transport: &'e dyn HttpTransport, base_url: &'e str, hooks: &'e SiteHooks) -> Self {
        Self {
            transport,
            base_url,
            hooks,
        }
    }

    /// Send `config` and decode the answer.
    ///
    /// A failed transport call still succeeds when the server answered below
    /// 400. With `check_login`, a response the login check rejects fails with
    /// [`AppError::NeedLogin`] whatever its status.
    pub async fn request(&self, mut config: RequestConfig, check_login: bool) -> Result<Response> {
        config
            .base_url
            .get_or_insert_with(|| self.base_url.to_string());
        config.url.get_or_insert_with(|| "/".to_string());

        log::debug!("{} {}", config.method(), request_url(&config));
        let raw = match self.transport.send(&config).await {
            Ok(raw) => raw,
            Err(err) => match err.response {
                Some(raw) if raw.status < 400 => {
                    log::debug!("Passing through status {} after: {}", raw.status, err.message);
                    raw
                }
                Some(raw) => return Err(AppError::http_status(raw.status, raw.status_text)),
                None => return Err(AppError::Network(err.message)),
            },
        };

        let response = decode(raw, config.response_type())?;
        if check_login && !self.hooks.is_logged_in(&response) {
            return Err(AppError::NeedLogin);
        }
        Ok(response)
    }
}

/// Decode the body according to the requested response type.
fn decode(raw: RawResponse, response_type: ResponseType) -> Result<Response> {
    let data = match response_type {
        ResponseType::Document => {
            ResponseData::Document(Html::parse_document(&unmask_cf_emails(&raw.body)))
        }
        ResponseType::Json if raw.body.trim().is_empty() => ResponseData::Json(Value::Null),
        ResponseType::Json => ResponseData::Json(
            serde_json::from_str(&raw.body)
                .map_err(|e| AppError::parse(format!("invalid JSON body: {e}")))?,
        ),
        ResponseType::Text => ResponseData::Text(raw.body),
    };

    Ok(Response {
        status: raw.status,
        status_text: raw.status_text,
        headers: raw.headers,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::extractor::parse_selector;
    use crate::services::stub::{Reply, StubTransport};

    fn document_text(response: &Response, selector: &str) -> String {
        let ResponseData::Document(html) = &response.data else {
            panic!("expected a document");
        };
        let selector = parse_selector(selector).unwrap();
        html.select(&selector)
            .next()
            .map(|el| el.text().collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_defaults_base_url_and_path() {
        let transport = StubTransport::new(Reply::ok("<p>hi</p>"));
        let hooks = SiteHooks::new();
        let gateway = RequestGateway::new(&transport, "https://demo.example/", &hooks);

        gateway.request(RequestConfig::default(), true).await.unwrap();
        let seen = transport.requests();
        assert_eq!(seen[0].base_url.as_deref(), Some("https://demo.example/"));
        assert_eq!(seen[0].url.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_soft_status_passes_through() {
        let transport = StubTransport::new(Reply::status(302, "Found", "<p>moved</p>"));
        let hooks = SiteHooks::new();
        let gateway = RequestGateway::new(&transport, "https://demo.example/", &hooks);

        let response = gateway.request(RequestConfig::default(), true).await.unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(document_text(&response, "p"), "moved");
    }

    #[tokio::test]
    async fn test_hard_status_fails() {
        let transport = StubTransport::new(Reply::status(404, "Not Found", ""));
        let hooks = SiteHooks::new();
        let gateway = RequestGateway::new(&transport, "https://demo.example/", &hooks);

        let err = gateway.request(RequestConfig::default(), true).await.unwrap_err();
        assert_eq!(err.to_string(), "Network Error: 404 Not Found");
    }

    #[tokio::test]
    async fn test_network_failure() {
        let transport = StubTransport::new(Reply::Unreachable);
        let hooks = SiteHooks::new();
        let gateway = RequestGateway::new(&transport, "https://demo.example/", &hooks);

        let err = gateway.request(RequestConfig::default(), true).await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
    }

    #[tokio::test]
    async fn test_cf_email_unmasked() {
        let body = r#"<p class="uploader">by <a href="/cdn-cgi/l/email-protection" class="__cf_email__" data-cfemail="422302206c21">[email&#160;protected]</a></p>"#;
        let transport = StubTransport::new(Reply::ok(body));
        let hooks = SiteHooks::new();
        let gateway = RequestGateway::new(&transport, "https://demo.example/", &hooks);

        let response = gateway.request(RequestConfig::default(), true).await.unwrap();
        assert_eq!(document_text(&response, "p.uploader"), "by a@b.c");
    }

    #[tokio::test]
    async fn test_login_check() {
        let transport = StubTransport::new(Reply::ok(r#"<form id="login"></form>"#));
        let hooks = SiteHooks::new().with_logged_check(|response| match &response.data {
            ResponseData::Document(html) => html
                .select(&parse_selector("form#login").unwrap())
                .next()
                .is_none(),
            _ => true,
        });
        let gateway = RequestGateway::new(&transport, "https://demo.example/", &hooks);

        let err = gateway.request(RequestConfig::default(), true).await.unwrap_err();
        assert!(matches!(err, AppError::NeedLogin));
        assert!(gateway.request(RequestConfig::default(), false).await.is_ok());
    }

    #[tokio::test]
    async fn test_json_body() {
        let transport = StubTransport::new(Reply::ok(r#"{ "data": [1, 2] }"#));
        let hooks = SiteHooks::new();
        let gateway = RequestGateway::new(&transport, "https://api.example/", &hooks);
        let config = RequestConfig {
            response_type: Some(ResponseType::Json),
            ..RequestConfig::default()
        };

        let response = gateway.request(config, true).await.unwrap();
        let ResponseData::Json(body) = response.data else {
            panic!("expected JSON");
        };
        assert_eq!(body["data"][1], 2);
    }
}
