//! Parsed, read-only view of a Swagger 2.0 contract.

use bindery_types::{Scheme, SpecError};
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

/// Connection settings applied over the values declared by the contract.
///
/// Operators use these to point a contract at a staging host or a local mock
/// without editing the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scheme: Option<Scheme>,
}

impl ConnectionOverrides {
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.port.is_none() && self.scheme.is_none()
    }
}

/// An immutable contract document.
///
/// Holds the resolved connection triple (`scheme`, `host`, `port`), the
/// contract version, ordered `definitions` and `paths`, and the raw document
/// for `$ref` resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDocument {
    host: String,
    scheme: Scheme,
    port: u16,
    version: String,
    title: Option<String>,
    definitions: IndexMap<String, Value>,
    paths: IndexMap<String, Value>,
    raw: Value,
}

impl ContractDocument {
    /// Reads the connection triple, version, definitions and paths from a
    /// parsed document.
    ///
    /// # Errors
    ///
    /// [`SpecError::MissingHost`] when `host` is absent or empty,
    /// [`SpecError::UnsupportedSchemes`] when `schemes` names neither `http`
    /// nor `https`, and [`SpecError::InvalidDocument`] for structural problems.
    pub fn from_value(raw: Value) -> Result<Self, SpecError> {
        if !raw.is_object() {
            return Err(SpecError::invalid_document("the document root must be a mapping"));
        }

        let host = match raw.get("host") {
            Some(Value::String(host)) if !host.trim().is_empty() => host.trim().to_string(),
            _ => return Err(SpecError::MissingHost),
        };
        let scheme = resolve_scheme(raw.get("schemes"))?;
        let version = raw
            .pointer("/info/version")
            .map(|version| match version {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let title = raw.pointer("/info/title").and_then(Value::as_str).map(str::to_string);

        let definitions = ordered_section(&raw, "definitions")?;
        let paths = ordered_section(&raw, "paths")?;

        Ok(Self {
            host,
            port: scheme.default_port(),
            scheme,
            version,
            title,
            definitions,
            paths,
            raw,
        })
    }

    /// Applies operator overrides. A scheme override without a port override
    /// also moves the port to the scheme's default.
    pub fn with_overrides(mut self, overrides: &ConnectionOverrides) -> Self {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(scheme) = overrides.scheme {
            self.scheme = scheme;
            self.port = scheme.default_port();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `info.version`, or an empty string when the contract declares none.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn definitions(&self) -> &IndexMap<String, Value> {
        &self.definitions
    }

    pub fn paths(&self) -> &IndexMap<String, Value> {
        &self.paths
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Resolves a local JSON reference such as `#/parameters/limit`.
    pub fn resolve_local_ref(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.raw.pointer(pointer)
    }

    /// Absolute URL of an operation: `{scheme}://{host}:{port}/{path}`.
    ///
    /// The template's leading `/` is not doubled and placeholders are kept as
    /// written.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, SpecError> {
        let text = format!(
            "{}://{}:{}/{}",
            self.scheme,
            self.host,
            self.port,
            path.trim_start_matches('/')
        );
        Url::parse(&text).map_err(|err| SpecError::invalid_document(format!("cannot build URL '{text}': {err}")))
    }
}

fn resolve_scheme(schemes: Option<&Value>) -> Result<Scheme, SpecError> {
    let declared: Vec<&str> = match schemes {
        Some(Value::Array(entries)) => entries.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(single)) => vec![single.as_str()],
        _ => Vec::new(),
    };
    if declared.contains(&"https") {
        Ok(Scheme::Https)
    } else if declared.contains(&"http") {
        Ok(Scheme::Http)
    } else {
        Err(SpecError::UnsupportedSchemes {
            schemes: schemes.map(Value::to_string).unwrap_or_else(|| "none".to_string()),
        })
    }
}

fn ordered_section(raw: &Value, key: &str) -> Result<IndexMap<String, Value>, SpecError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(IndexMap::new()),
        Some(Value::Object(entries)) => Ok(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Some(_) => Err(SpecError::invalid_document(format!("'{key}' must be a mapping"))),
    }
}
