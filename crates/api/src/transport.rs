//! HTTP execution of outbound requests.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bindery_types::{OutboundRequest, RawResponse, TransportError, request::JSON_CONTENT_TYPE};
use reqwest::{Client, Method, header};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Executes one logical request and returns the raw status and body.
///
/// Implementations decide how retries and timeouts apply; callers only see the
/// final outcome.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] over a shared `reqwest::Client`.
///
/// Each attempt is bounded by `timeout`; timeouts and connection failures are
/// retried up to `retries` more times. Any other failure is returned at once.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    user_agent: String,
    timeout: Duration,
    retries: u32,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static(JSON_CONTENT_TYPE));

        let http = Client::builder()
            .default_headers(default_headers)
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            retries: config.retries,
        })
    }

    /// Replaces the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    async fn attempt(&self, method: Method, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        let url = request.url.as_str();
        let mut builder = self
            .http
            .request(method, request.url.clone())
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .timeout(self.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| self.classify(url, error))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| TransportError::Body {
            url: url.to_string(),
            message: error.to_string(),
        })?;
        Ok(RawResponse::new(status, body))
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            };
        }
        let message = error_chain(&error);
        if error.is_connect() {
            TransportError::Connect {
                url: url.to_string(),
                message,
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                message,
            }
        }
    }
}

/// Joins an error with its sources, e.g. `error sending request: tls handshake eof`.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes()).map_err(|error| TransportError::Request {
            url: request.url.to_string(),
            message: error.to_string(),
        })?;

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            match self.attempt(method.clone(), request).await {
                Ok(response) => {
                    debug!(
                        method = %method,
                        url = %request.url,
                        status = response.status,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    return Ok(response);
                }
                Err(error) if error.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        method = %method,
                        url = %request.url,
                        attempt,
                        retries = self.retries,
                        error = %error,
                        "retrying request"
                    );
                }
                Err(error) => {
                    warn!(
                        method = %method,
                        url = %request.url,
                        duration_ms = started.elapsed().as_millis() as u64,
                        error = %error,
                        "request failed"
                    );
                    return Err(error);
                }
            }
        }
    }
}

/// Flattens named arguments into query pairs; array values repeat the key.
pub fn build_query_pairs(query_parameters: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query_parameters {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), query_value_to_string(item)));
                }
            }
            Value::Null => {}
            other => pairs.push((key.clone(), query_value_to_string(other))),
        }
    }
    pairs
}

fn query_value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_query_pairs_repeats_array_values() {
        let query = Map::from_iter([
            ("target".to_string(), json!(["production", "preview"])),
            ("decrypt".to_string(), json!(true)),
            ("skip".to_string(), Value::Null),
        ]);

        let pairs = build_query_pairs(&query);
        assert_eq!(
            pairs,
            vec![
                ("target".to_string(), "production".to_string()),
                ("target".to_string(), "preview".to_string()),
                ("decrypt".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn transport_takes_timeout_and_retries_from_config() {
        let config = ClientConfig {
            timeout_secs: 7,
            retries: 3,
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config).expect("build transport");
        assert_eq!(transport.timeout(), Duration::from_secs(7));
        assert_eq!(transport.retries(), 3);
    }
}
