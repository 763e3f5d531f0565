//! Logical request/response pair exchanged between client callers and the transport.

use serde_json::{Value, json};
use url::Url;

use crate::HttpMethod;

/// Content type sent and accepted by every generated client call.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully assembled, not-yet-executed request.
///
/// The URL carries no query string; query parameters are kept as ordered pairs
/// so the transport can encode them and tests can assert on them verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: None,
        }
    }

    /// URL including the encoded query string, as it will appear on the wire.
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(key, value)| (key.as_str(), value.as_str())));
        }
        url
    }

    /// JSON rendering used for dry runs and debug output.
    pub fn to_json(&self) -> Value {
        json!({
            "method": self.method.as_str(),
            "url": self.full_url().as_str(),
            "headers": {
                "Content-Type": JSON_CONTENT_TYPE,
                "Accept": JSON_CONTENT_TYPE,
            },
            "body": self.body,
        })
    }
}

/// Status and raw body of an executed request, before schema decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}
