// src/services/stub.rs

//! In-memory transport for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{RawResponse, RequestConfig};
use crate::utils::http::{HttpTransport, TransportError};

/// What the stub answers to every request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A response; non-2xx statuses are reported as transport failures.
    Respond(RawResponse),
    /// No response at all.
    Unreachable,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Self::status(200, "OK", body)
    }

    pub fn status(status: u16, status_text: &str, body: &str) -> Self {
        Self::Respond(RawResponse {
            status,
            status_text: status_text.to_string(),
            headers: BTreeMap::new(),
            body: body.to_string(),
        })
    }
}

/// Records every request and answers with a fixed [`Reply`].
#[derive(Debug)]
pub struct StubTransport {
    reply: Reply,
    seen: Mutex<Vec<RequestConfig>>,
}

impl StubTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RequestConfig> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, config: &RequestConfig) -> Result<RawResponse, TransportError> {
        self.seen.lock().unwrap().push(config.clone());
        match &self.reply {
            Reply::Respond(raw) if (200..300).contains(&raw.status) => Ok(raw.clone()),
            Reply::Respond(raw) => Err(TransportError::with_response(
                format!("Request failed with status code {}", raw.status),
                raw.clone(),
            )),
            Reply::Unreachable => Err(TransportError::new("connection refused")),
        }
    }
}
