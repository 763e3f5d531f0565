//! Client stubs: one callable per `x-bind-client` operation.

use std::sync::Arc;

use bindery_api::build_query_pairs;
use bindery_compiler::{BoundEndpoint, Contract};
use bindery_registry::{ModelInstance, ModelRegistry};
use bindery_types::{BindingError, CallError, OutboundRequest, ParamMode, SpecError, ValidationError};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::info;
use url::Url;

use crate::caller::ClientCaller;

/// Arguments of one stub invocation.
///
/// Body-mode stubs take exactly one positional model instance; Query-mode
/// stubs take named values that become query parameters; None-mode stubs take
/// nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<ModelInstance>,
    pub named: Map<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, instance: ModelInstance) -> Self {
        self.positional.push(instance);
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl From<ModelInstance> for CallArgs {
    fn from(instance: ModelInstance) -> Self {
        Self::new().arg(instance)
    }
}

/// A callable bound to one client-exposed endpoint.
#[derive(Debug, Clone)]
pub struct ClientStub {
    name: String,
    endpoint: Arc<BoundEndpoint>,
    registry: Arc<ModelRegistry>,
    url: Url,
}

impl ClientStub {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &Arc<BoundEndpoint> {
        &self.endpoint
    }

    /// Absolute URL the stub sends requests to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Builds a pending request from `args` without performing any I/O.
    ///
    /// # Errors
    ///
    /// [`BindingError`] when arguments do not match the parameter mode and
    /// [`ValidationError`] when a Body-mode stub does not receive exactly one
    /// instance of its body model.
    pub fn invoke(&self, args: CallArgs) -> Result<ClientCaller, CallError> {
        let descriptor = &self.endpoint.descriptor;
        let mode = descriptor.param_mode;
        let mut request = OutboundRequest::new(descriptor.method, self.url.clone());

        match mode {
            ParamMode::None => {
                self.reject_positional(mode, &args)?;
                self.reject_named(mode, &args)?;
            }
            ParamMode::Query => {
                self.reject_positional(mode, &args)?;
                request.query = build_query_pairs(&args.named);
            }
            ParamMode::Body => {
                self.reject_named(mode, &args)?;
                let mut positional = args.positional;
                if positional.len() != 1 {
                    return Err(ValidationError::root(format!(
                        "{} expects exactly 1 parameter, got {}",
                        self.name,
                        positional.len()
                    ))
                    .into());
                }
                let instance = positional.remove(0);
                let expected = self
                    .endpoint
                    .schema
                    .body
                    .as_ref()
                    .map(|body| body.model.as_str())
                    .unwrap_or_default();
                if instance.model_name() != expected {
                    return Err(ValidationError::root(format!(
                        "{} expects an instance of {expected}, got {}",
                        self.name,
                        instance.model_name()
                    ))
                    .into());
                }
                request.body = Some(self.registry.marshal(&instance)?);
            }
        }

        Ok(ClientCaller::new(Arc::clone(&self.endpoint), Arc::clone(&self.registry), request))
    }

    fn reject_positional(&self, mode: ParamMode, args: &CallArgs) -> Result<(), BindingError> {
        if args.positional.is_empty() {
            return Ok(());
        }
        Err(BindingError::PositionalNotAccepted {
            handler: self.name.clone(),
            mode,
            count: args.positional.len(),
        })
    }

    fn reject_named(&self, mode: ParamMode, args: &CallArgs) -> Result<(), BindingError> {
        if args.named.is_empty() {
            return Ok(());
        }
        Err(BindingError::NamedNotAccepted {
            handler: self.name.clone(),
            mode,
            names: args.named.keys().cloned().collect(),
        })
    }
}

/// Every client stub of a contract, keyed by `x-bind-client` name.
#[derive(Debug, Clone, Default)]
pub struct ClientStubs {
    stubs: IndexMap<String, ClientStub>,
}

impl ClientStubs {
    /// Generates one stub per endpoint that declares a client name.
    ///
    /// # Errors
    ///
    /// [`SpecError::DuplicateClientBinding`] when two operations share a client
    /// name.
    pub fn generate(contract: &Contract) -> Result<Self, SpecError> {
        let document = contract.document();
        let mut stubs = IndexMap::new();

        for endpoint in contract.endpoints() {
            let Some(name) = endpoint.handler_client() else {
                continue;
            };
            if stubs.contains_key(name) {
                return Err(SpecError::DuplicateClientBinding { name: name.to_string() });
            }

            let url = document.endpoint_url(&endpoint.descriptor.path)?;
            info!(
                method = %endpoint.descriptor.method,
                path = %endpoint.descriptor.path,
                client = %name,
                "generating client"
            );
            stubs.insert(
                name.to_string(),
                ClientStub {
                    name: name.to_string(),
                    endpoint: Arc::clone(endpoint),
                    registry: Arc::clone(contract.registry()),
                    url,
                },
            );
        }

        Ok(Self { stubs })
    }

    pub fn get(&self, name: &str) -> Option<&ClientStub> {
        self.stubs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stubs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientStub> {
        self.stubs.values()
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }
}
