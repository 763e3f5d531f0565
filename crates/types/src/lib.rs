//! Shared type definitions for the bindery workspace.
//!
//! These types describe compiled contract metadata (endpoint descriptors and the
//! server binding table), the logical outbound request/response pair exchanged
//! with the transport, and the error taxonomy used by every other crate.

use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod error;
pub mod request;

pub use error::{BindingError, CallError, ErrorReply, SpecError, TransportError, ValidationError};
pub use request::{OutboundRequest, RawResponse};

/// HTTP verbs an operation can be declared under.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Uppercase wire name (e.g. `GET`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ParseHttpMethodError;

    /// Accepts path-item keys in any case (`get`, `GET`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            "head" => Ok(Self::Head),
            "options" => Ok(Self::Options),
            _ => Err(ParseHttpMethodError),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseHttpMethodError;

impl fmt::Display for ParseHttpMethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid http method; expected one of get, post, put, patch, delete, head, options")
    }
}

impl Error for ParseHttpMethodError {}

/// How the arguments of an operation travel on the wire.
///
/// There is no path mode: operations declaring path parameters are rejected at
/// compile time and never produce a descriptor.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamMode {
    /// The operation takes no parameters.
    None,
    /// A single JSON body holding one model instance.
    Body,
    /// One or more named query parameters.
    Query,
}

impl fmt::Display for ParamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Body => "body",
            Self::Query => "query",
        })
    }
}

/// Where a declared parameter is placed.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    Body,
    Query,
    Path,
    Header,
    FormData,
}

impl FromStr for ParamLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "body" => Ok(Self::Body),
            "query" => Ok(Self::Query),
            "path" => Ok(Self::Path),
            "header" => Ok(Self::Header),
            "formData" => Ok(Self::FormData),
            other => Err(format!("unknown parameter location '{other}'")),
        }
    }
}

/// A parameter as declared on an operation, after `$ref` resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name (`name` key).
    pub name: String,
    /// Placement (`in` key).
    pub location: ParamLocation,
    /// Whether the contract marks the parameter as required.
    #[serde(default)]
    pub required: bool,
    /// The raw parameter object, kept for schema binding.
    pub raw: serde_json::Value,
}

/// Compiled, validated metadata for one (path, method) operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// URI template exactly as declared under `paths`.
    pub path: String,
    /// HTTP verb of the operation.
    pub method: HttpMethod,
    /// Qualified name of the server-side implementation (`x-bind-server`).
    pub handler_server: String,
    /// Name exposed to callers (`x-bind-client`); `None` means server-only.
    #[serde(default)]
    pub handler_client: Option<String>,
    /// Whether the operation requires an authenticated caller (`x-auth-required`).
    pub requires_auth: bool,
    /// Resolved parameter-passing convention.
    pub param_mode: ParamMode,
    /// Opaque server-side hook name (`x-decorate-server`).
    #[serde(default)]
    pub decorate_server: Option<String>,
    /// Opaque request hook name (`x-decorate-request`).
    #[serde(default)]
    pub decorate_request: Option<String>,
    /// Declared parameters, path-level ones merged under operation-level ones.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl EndpointDescriptor {
    /// Short identifier used in log lines and error messages, e.g. `GET /v1/version`.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Row handed to the server collaborator.
    pub fn server_binding(&self) -> ServerBinding {
        ServerBinding {
            path: self.path.clone(),
            method: self.method,
            handler_server: self.handler_server.clone(),
            param_mode: self.param_mode,
            requires_auth: self.requires_auth,
            decorate_server: self.decorate_server.clone(),
            decorate_request: self.decorate_request.clone(),
        }
    }
}

/// One row of the binding table consumed by the HTTP server framework.
///
/// The server is responsible for routing and invocation; this row only tells it
/// which handler serves the route and how arguments arrive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBinding {
    pub path: String,
    pub method: HttpMethod,
    pub handler_server: String,
    pub param_mode: ParamMode,
    pub requires_auth: bool,
    #[serde(default)]
    pub decorate_server: Option<String>,
    #[serde(default)]
    pub decorate_request: Option<String>,
}

/// Transport scheme of a contract.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Port implied by the scheme when the contract does not override it.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!("unsupported scheme '{other}'; expected http or https")),
        }
    }
}
