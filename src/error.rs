// src/error.rs

//! Unified error handling for the search engine.

use std::fmt;

use thiserror::Error;

use crate::models::SearchStatus;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Malformed site configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The source answered, but the session is not logged in
    #[error("Login required")]
    NeedLogin,

    /// The page loaded but no record rows were found
    #[error("No records found")]
    NoRecords,

    /// The server answered with a status code of 400 or above
    #[error("Network Error: {status} {status_text}")]
    HttpStatus { status: u16, status_text: String },

    /// The transport failed without any response
    #[error("Network Error: {0}")]
    Network(String),

    /// Row or record extraction failed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a parse error.
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse(message.to_string())
    }

    /// Create an HTTP status error.
    pub fn http_status(status: u16, status_text: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            status_text: status_text.into(),
        }
    }

    /// Status a search reports when this error ends its request phase.
    pub fn search_status(&self) -> SearchStatus {
        match self {
            Self::NeedLogin => SearchStatus::NeedLogin,
            Self::NoRecords => SearchStatus::NoResults,
            _ => SearchStatus::ParseError,
        }
    }
}
