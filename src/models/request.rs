//! Request templates and responses exchanged with the HTTP transport.

use std::collections::BTreeMap;

use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::utils::path;

/// Shape the response body is decoded into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Document,
    Json,
    Text,
}

/// A request template, field-compatible with axios-style configs.
///
/// Every field is optional so that partial templates can be layered with
/// [`RequestConfig::merged`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, rename = "baseURL", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
}

impl RequestConfig {
    /// Base template of every search: a document GET of the root path.
    pub fn search_default() -> Self {
        Self {
            url: Some("/".to_string()),
            response_type: Some(ResponseType::Document),
            params: Some(Map::new()),
            data: Some(Value::Object(Map::new())),
            ..Self::default()
        }
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type.unwrap_or_default()
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }

    /// Deep-merge `other` over `self`; objects merge key by key, everything else is replaced.
    pub fn merged(&self, other: &RequestConfig) -> Result<RequestConfig> {
        let mut base = serde_json::to_value(self)?;
        let overlay = serde_json::to_value(other)?;
        merge_value(&mut base, &overlay);
        Ok(serde_json::from_value(base)?)
    }

    /// Write `value` at a dotted path such as `params.keywords`.
    pub fn set_path(&mut self, key_path: &str, value: Value) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)?;
        path::set(&mut tree, key_path, value);
        *self = serde_json::from_value(tree).map_err(|e| {
            AppError::config(format!("cannot write request path '{key_path}': {e}"))
        })?;
        Ok(())
    }
}

/// Recursive JSON merge: objects are merged, any other overlay value wins.
pub fn merge_value(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// What the transport hands back before the body is decoded.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// A decoded response body.
#[derive(Debug)]
pub enum ResponseData {
    Document(Html),
    Json(Value),
    Text(String),
}

/// A response after the gateway has decoded and post-processed it.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub data: ResponseData,
}
