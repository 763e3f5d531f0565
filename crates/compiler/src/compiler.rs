//! Walks a contract's `paths` and validates every operation into an
//! [`EndpointDescriptor`].
//!
//! Traversal is pull-based: [`ContractCompiler::endpoints`] yields one result
//! per operation and stops after the first error. [`ContractCompiler::for_each_endpoint`]
//! and [`ContractCompiler::compile_all`] are built on top of it.

use std::str::FromStr;

use bindery_types::{EndpointDescriptor, HttpMethod, ParamLocation, ParamMode, ParameterSpec, SpecError};
use indexmap::map;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::ContractDocument;

const JSON_MEDIA_TYPE: &str = "application/json";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\s*([^{}/\s]+)\s*\}").expect("valid placeholder regex"));

/// Compiles the operations of one contract document.
#[derive(Debug, Clone, Copy)]
pub struct ContractCompiler<'a> {
    document: &'a ContractDocument,
}

impl<'a> ContractCompiler<'a> {
    pub fn new(document: &'a ContractDocument) -> Self {
        Self { document }
    }

    /// Lazily compiled endpoints, in path then method declaration order.
    ///
    /// Operations marked `x-no-bind-server` are skipped. The iterator ends after
    /// yielding the first error.
    pub fn endpoints(&self) -> Endpoints<'a> {
        Endpoints {
            document: self.document,
            paths: self.document.paths().iter(),
            current: None,
            failed: false,
        }
    }

    /// Invokes `callback` with every compiled endpoint.
    pub fn for_each_endpoint<F>(&self, mut callback: F) -> Result<(), SpecError>
    where
        F: FnMut(EndpointDescriptor),
    {
        for endpoint in self.endpoints() {
            callback(endpoint?);
        }
        Ok(())
    }

    /// Compiles every endpoint, aborting on the first invalid operation.
    pub fn compile_all(&self) -> Result<Vec<EndpointDescriptor>, SpecError> {
        self.endpoints().collect()
    }
}

/// Pull iterator over the compiled operations of a contract.
pub struct Endpoints<'a> {
    document: &'a ContractDocument,
    paths: map::Iter<'a, String, Value>,
    current: Option<PathCursor<'a>>,
    failed: bool,
}

struct PathCursor<'a> {
    path: &'a str,
    item: &'a Value,
    operations: serde_json::map::Iter<'a>,
}

impl Iterator for Endpoints<'_> {
    type Item = Result<EndpointDescriptor, SpecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(cursor) = self.current.as_mut() {
                for (key, operation) in cursor.operations.by_ref() {
                    // Path items also carry `parameters` and vendor extensions.
                    let Ok(method) = HttpMethod::from_str(key) else {
                        continue;
                    };
                    match compile_operation(self.document, cursor.path, cursor.item, method, operation) {
                        Ok(Some(endpoint)) => return Some(Ok(endpoint)),
                        Ok(None) => continue,
                        Err(err) => {
                            self.failed = true;
                            return Some(Err(err));
                        }
                    }
                }
                self.current = None;
            }

            let (path, item) = self.paths.next()?;
            let Some(operations) = item.as_object() else {
                self.failed = true;
                return Some(Err(SpecError::invalid_document(format!(
                    "path item '{path}' must be a mapping"
                ))));
            };
            self.current = Some(PathCursor {
                path: path.as_str(),
                item,
                operations: operations.iter(),
            });
        }
    }
}

/// Validates one operation. `Ok(None)` means the operation opted out of
/// server binding.
fn compile_operation(
    document: &ContractDocument,
    path: &str,
    path_item: &Value,
    method: HttpMethod,
    operation: &Value,
) -> Result<Option<EndpointDescriptor>, SpecError> {
    let label = format!("{method} {path}");
    let Some(operation) = operation.as_object() else {
        return Err(SpecError::invalid_document(format!("operation {label} must be a mapping")));
    };

    check_produces(&label, operation.get("produces"))?;

    let handler_server = match operation.get("x-bind-server") {
        Some(Value::String(handler)) => handler.clone(),
        Some(_) => return Err(SpecError::invalid_extension(&label, "x-bind-server", "a string")),
        None if operation.contains_key("x-no-bind-server") => {
            info!(method = %method, path = %path, "skipping generation of unbound operation");
            return Ok(None);
        }
        None => return Err(SpecError::MissingServerBinding { operation: label }),
    };

    let handler_client = optional_string(&label, operation.get("x-bind-client"), "x-bind-client")?;

    let requires_auth = match operation.get("x-auth-required") {
        None => true,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(SpecError::InvalidAuthFlag { operation: label }),
    };

    let decorate_server = optional_string(&label, operation.get("x-decorate-server"), "x-decorate-server")?;
    let decorate_request = optional_string(&label, operation.get("x-decorate-request"), "x-decorate-request")?;

    let parameters = collect_parameters(document, &label, path_item, operation)?;
    let param_mode = resolve_param_mode(&label, &parameters)?;

    let placeholders = extract_path_placeholders(path);
    if !placeholders.is_empty() {
        warn!(
            method = %method,
            path = %path,
            placeholders = ?placeholders,
            "path template has placeholders but no path parameters; keeping it verbatim"
        );
    }

    debug!(
        method = %method,
        path = %path,
        handler = %handler_server,
        mode = %param_mode,
        "compiled endpoint"
    );

    Ok(Some(EndpointDescriptor {
        path: path.to_string(),
        method,
        handler_server,
        handler_client,
        requires_auth,
        param_mode,
        decorate_server,
        decorate_request,
        parameters,
    }))
}

fn check_produces(label: &str, produces: Option<&Value>) -> Result<(), SpecError> {
    let entries = match produces {
        None => {
            return Err(SpecError::MissingProduces {
                operation: label.to_string(),
            });
        }
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(SpecError::UnsupportedProduces {
                operation: label.to_string(),
                produces: other.to_string(),
            });
        }
    };
    match entries.as_slice() {
        [single] if single.as_str() == Some(JSON_MEDIA_TYPE) => Ok(()),
        [single] => Err(SpecError::UnsupportedProduces {
            operation: label.to_string(),
            produces: single.as_str().map(str::to_string).unwrap_or_else(|| single.to_string()),
        }),
        _ => Err(SpecError::TooManyProduces {
            operation: label.to_string(),
        }),
    }
}

fn optional_string(label: &str, value: Option<&Value>, key: &str) -> Result<Option<String>, SpecError> {
    match value {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(SpecError::invalid_extension(label, key, "a string")),
    }
}

/// Merges path-level and operation-level parameters.
///
/// Parameters are identified by `(name, in)`; an operation-level parameter
/// replaces a path-level one in place. `$ref` entries are resolved against the
/// document.
fn collect_parameters(
    document: &ContractDocument,
    label: &str,
    path_item: &Value,
    operation: &serde_json::Map<String, Value>,
) -> Result<Vec<ParameterSpec>, SpecError> {
    let mut out: Vec<ParameterSpec> = Vec::new();

    for source in [path_item.get("parameters"), operation.get("parameters")] {
        let entries = match source {
            None => continue,
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(SpecError::unsupported_parameters(label, "'parameters' must be a list")),
        };
        for entry in entries {
            let parameter = parse_parameter(document, label, entry)?;
            match out
                .iter()
                .position(|seen| seen.name == parameter.name && seen.location == parameter.location)
            {
                Some(index) => out[index] = parameter,
                None => out.push(parameter),
            }
        }
    }

    Ok(out)
}

fn parse_parameter(document: &ContractDocument, label: &str, entry: &Value) -> Result<ParameterSpec, SpecError> {
    let resolved = match entry.get("$ref") {
        Some(Value::String(reference)) => document.resolve_local_ref(reference).ok_or_else(|| {
            SpecError::unsupported_parameters(label, format!("cannot resolve parameter reference '{reference}'"))
        })?,
        Some(_) => return Err(SpecError::unsupported_parameters(label, "parameter '$ref' must be a string")),
        None => entry,
    };

    let name = resolved
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| SpecError::unsupported_parameters(label, "parameter has no 'name'"))?;
    let location = resolved
        .get("in")
        .and_then(Value::as_str)
        .ok_or_else(|| SpecError::unsupported_parameters(label, format!("parameter '{name}' has no 'in'")))?;
    let location = ParamLocation::from_str(location).map_err(|reason| SpecError::unsupported_parameters(label, reason))?;

    Ok(ParameterSpec {
        name: name.to_string(),
        location,
        required: resolved.get("required").and_then(Value::as_bool).unwrap_or(false),
        raw: resolved.clone(),
    })
}

fn resolve_param_mode(label: &str, parameters: &[ParameterSpec]) -> Result<ParamMode, SpecError> {
    if let Some(parameter) = parameters.iter().find(|p| p.location == ParamLocation::Path) {
        return Err(SpecError::PathParameter {
            operation: label.to_string(),
            name: parameter.name.clone(),
        });
    }

    let body = parameters.iter().filter(|p| p.location == ParamLocation::Body).count();
    let query = parameters.iter().filter(|p| p.location == ParamLocation::Query).count();

    match (parameters.len(), body, query) {
        (0, _, _) => Ok(ParamMode::None),
        (1, 1, _) => Ok(ParamMode::Body),
        (total, 0, query) if total == query => Ok(ParamMode::Query),
        (_, body, query) if body > 0 && query > 0 => Err(SpecError::unsupported_parameters(
            label,
            "body and query parameters cannot be mixed",
        )),
        (_, body, _) if body > 1 => Err(SpecError::unsupported_parameters(label, "at most one body parameter")),
        _ => {
            let other = parameters
                .iter()
                .find(|p| !matches!(p.location, ParamLocation::Body | ParamLocation::Query))
                .map(|p| format!("parameter '{}' is placed in {:?}", p.name, p.location))
                .unwrap_or_else(|| "unsupported parameter placement".to_string());
            Err(SpecError::unsupported_parameters(label, other))
        }
    }
}

/// `{name}` placeholders of a URI template.
fn extract_path_placeholders(path: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(path)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .collect()
}
