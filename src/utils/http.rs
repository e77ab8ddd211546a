// src/utils/http.rs

//! HTTP transport used by the request gateway.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{HttpConfig, RawResponse, RequestConfig};
use crate::utils::url::join;

/// A transport-level failure, optionally carrying the response that caused it.
#[derive(Debug)]
pub struct TransportError {
    pub message: String,
    pub response: Option<RawResponse>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
        }
    }

    pub fn with_response(message: impl Into<String>, response: RawResponse) -> Self {
        Self {
            message: message.into(),
            response: Some(response),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

/// Sends one request. Non-2xx answers are reported as a [`TransportError`]
/// carrying the response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, config: &RequestConfig) -> std::result::Result<RawResponse, TransportError>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Full request address: `url` when absolute, otherwise joined to `base_url`.
pub fn request_url(config: &RequestConfig) -> String {
    let path = config.url.as_deref().unwrap_or("/");
    match config.base_url.as_deref() {
        Some(base) if !path.starts_with("http://") && !path.starts_with("https://") => {
            join(base, path)
        }
        _ => path.to_string(),
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, config: &RequestConfig) -> Result<reqwest::RequestBuilder> {
        let method = Method::from_bytes(config.method().to_ascii_uppercase().as_bytes())
            .map_err(|e| AppError::config(format!("invalid method '{}': {e}", config.method())))?;
        let url = url::Url::parse(&request_url(config))?;
        let mut request = self.client.request(method.clone(), url);

        if let Some(params) = &config.params {
            let pairs: Vec<(&str, String)> = params
                .iter()
                .filter_map(|(k, v)| query_value(v).map(|v| (k.as_str(), v)))
                .collect();
            request = request.query(&pairs);
        }

        if let Some(headers) = &config.headers {
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        if method != Method::GET && method != Method::HEAD {
            match &config.data {
                Some(Value::String(body)) => request = request.body(body.clone()),
                Some(Value::Object(map)) if map.is_empty() => {}
                Some(Value::Null) | None => {}
                Some(data) => {
                    request = request
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(serde_json::to_vec(data)?);
                }
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, config: &RequestConfig) -> std::result::Result<RawResponse, TransportError> {
        let request = self
            .build(config)
            .map_err(|e| TransportError::new(e.to_string()))?;
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        let raw = RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        };

        if status.is_success() {
            Ok(raw)
        } else {
            Err(TransportError::with_response(
                format!("Request failed with status code {}", status.as_u16()),
                raw,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_url_joins_base() {
        let config: RequestConfig = serde_json::from_value(json!({
            "baseURL": "https://x.example/",
            "url": "/torrents.php"
        }))
        .unwrap();
        assert_eq!(request_url(&config), "https://x.example/torrents.php");
    }

    #[test]
    fn test_request_url_absolute_wins() {
        let config: RequestConfig = serde_json::from_value(json!({
            "baseURL": "https://x.example/",
            "url": "https://api.example/search"
        }))
        .unwrap();
        assert_eq!(request_url(&config), "https://api.example/search");
    }

    #[test]
    fn test_build_get_request() {
        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();
        let config: RequestConfig = serde_json::from_value(json!({
            "baseURL": "https://x.example/",
            "url": "/torrents.php",
            "params": { "search": "ubuntu", "page": 2, "skip": null }
        }))
        .unwrap();

        let request = transport.build(&config).unwrap().build().unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://x.example/torrents.php?search=ubuntu&page=2"
        );
    }

    #[test]
    fn test_build_post_json_body() {
        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();
        let config: RequestConfig = serde_json::from_value(json!({
            "method": "post",
            "baseURL": "https://api.example/",
            "url": "/search",
            "data": { "keyword": "ubuntu" }
        }))
        .unwrap();

        let request = transport.build(&config).unwrap().build().unwrap();
        assert_eq!(request.method(), Method::POST);
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"keyword":"ubuntu"}"#);
    }
}
