//! Error taxonomy shared by the compiler, the model registry and the client engine.
//!
//! - [`SpecError`]: the contract itself is malformed; fatal at compile/bind time.
//! - [`ValidationError`]: a value does not conform to its declared schema.
//! - [`BindingError`]: a client stub was invoked against its parameter mode.
//! - [`TransportError`]: network-level failure while executing a request.
//! - [`CallError`]: call-time umbrella returned inside call results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ParamMode;

/// The contract document is malformed or ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("contract has no 'host' entry")]
    MissingHost,

    #[error("contract schemes contain neither http nor https: {schemes}")]
    UnsupportedSchemes { schemes: String },

    #[error("invalid contract document: {reason}")]
    InvalidDocument { reason: String },

    #[error("contract has no 'produces' section for {operation}")]
    MissingProduces { operation: String },

    #[error("expecting only one type under 'produces' for {operation}")]
    TooManyProduces { operation: String },

    #[error("only 'application/json' is supported; {operation} produces '{produces}'")]
    UnsupportedProduces { operation: String, produces: String },

    #[error("contract defines no x-bind-server for {operation}")]
    MissingServerBinding { operation: String },

    #[error("contract contains x-auth-required without boolean value at {operation}")]
    InvalidAuthFlag { operation: String },

    #[error("extension '{key}' at {operation} must be {expected}")]
    InvalidExtension {
        operation: String,
        key: String,
        expected: String,
    },

    #[error("'path' parameters are not supported ({operation}, parameter '{name}')")]
    PathParameter { operation: String, name: String },

    #[error("{operation} uses an unsupported parameter model: {detail}")]
    UnsupportedParameterModel { operation: String, detail: String },

    #[error("undefined model '{name}' referenced by {context}")]
    UndefinedModel { name: String, context: String },

    #[error("invalid definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("client binding '{name}' is declared by more than one operation")]
    DuplicateClientBinding { name: String },
}

impl SpecError {
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument { reason: reason.into() }
    }

    pub fn invalid_definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn undefined_model(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UndefinedModel {
            name: name.into(),
            context: context.into(),
        }
    }

    pub fn unsupported_parameters(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnsupportedParameterModel {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn invalid_extension(operation: impl Into<String>, key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidExtension {
            operation: operation.into(),
            key: key.into(),
            expected: expected.into(),
        }
    }

    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply::new(500, "SPEC_ERROR", self.to_string())
    }
}

/// A value does not conform to its declared schema.
///
/// `path` is a JSON-path-like location of the violation (`$` for the root,
/// `$.bar.b` for a nested field, `$[2]` for an array item).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (at {path})")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// A violation that concerns the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new("$", message)
    }

    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply::new(400, "INVALID_PARAMETER", self.to_string())
    }
}

/// A client stub was invoked in a way its parameter mode does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("{handler} is a {mode}-mode call and takes no positional arguments (got {count})")]
    PositionalNotAccepted { handler: String, mode: ParamMode, count: usize },

    #[error("{handler} is a {mode}-mode call and takes no named arguments (got {names:?})")]
    NamedNotAccepted {
        handler: String,
        mode: ParamMode,
        names: Vec<String>,
    },

    #[error("no client binding named '{handler}'")]
    UnknownHandler { handler: String },
}

impl BindingError {
    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply::new(400, "BINDING_ERROR", self.to_string())
    }
}

/// Network-level failure while executing an outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("could not read response body from {url}: {message}")]
    Body { url: String, message: String },
}

impl TransportError {
    /// Whether a retry policy may reissue the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect { .. })
    }

    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply::new(502, "TRANSPORT_ERROR", self.to_string())
    }
}

/// Errors produced while invoking a stub or executing a client caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("unexpected reply with status {status}")]
    UnexpectedReply { status: u16, body: Value },
}

impl CallError {
    /// Structured reply suitable for serialization as an HTTP error body.
    pub fn to_reply(&self) -> ErrorReply {
        match self {
            Self::Validation(error) => error.to_reply(),
            Self::Binding(error) => error.to_reply(),
            Self::Transport(error) => error.to_reply(),
            Self::UnexpectedReply { status, body } => ErrorReply::new(*status, "UNEXPECTED_REPLY", body.to_string()),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Error body shape: `{"status": 400, "error": "INVALID_PARAMETER", "error_description": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub status: u16,
    pub error: String,
    pub error_description: String,
}

impl ErrorReply {
    pub fn new(status: u16, error: impl Into<String>, error_description: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            error_description: error_description.into(),
        }
    }
}
