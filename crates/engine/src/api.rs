//! Facade over a compiled contract: stubs, registry and dispatcher in one place.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use bindery_api::{ClientConfig, HttpTransport, Transport};
use bindery_compiler::{ConnectionOverrides, Contract, ContractDocument, load_document_from_path, parse_document_str};
use bindery_registry::{ModelInstance, ModelRegistry};
use bindery_types::{BindingError, CallError, ServerBinding, ValidationError};
use serde_json::Value;

use crate::{
    caller::ClientCaller,
    dispatch::{CallResult, Dispatcher, ErrorPolicy},
    stubs::{CallArgs, ClientStub, ClientStubs},
};

/// A named, ready-to-call client for one contract.
#[derive(Debug, Clone)]
pub struct Api {
    name: String,
    contract: Contract,
    stubs: ClientStubs,
    dispatcher: Dispatcher,
}

impl Api {
    /// Compiles `document` and wires an [`HttpTransport`] built from `config`.
    ///
    /// Host, port and scheme set in `config` override the contract's own.
    pub fn from_document(name: impl Into<String>, document: ContractDocument, config: &ClientConfig) -> Result<Self> {
        let name = name.into();
        let overrides = ConnectionOverrides {
            host: config.host.clone(),
            port: config.port,
            scheme: config.scheme,
        };
        let document = document.with_overrides(&overrides);
        let contract = Contract::compile(document).with_context(|| format!("compile contract '{name}'"))?;
        let stubs = ClientStubs::generate(&contract).with_context(|| format!("generate clients for '{name}'"))?;
        let transport = HttpTransport::new(config)?;

        Ok(Self {
            name,
            contract,
            stubs,
            dispatcher: Dispatcher::new(Arc::new(transport), ErrorPolicy::default()),
        })
    }

    pub fn from_value(name: impl Into<String>, value: Value, config: &ClientConfig) -> Result<Self> {
        let document = ContractDocument::from_value(value).context("read contract document")?;
        Self::from_document(name, document, config)
    }

    /// Parses a YAML (or JSON) contract from text.
    pub fn from_yaml_str(name: impl Into<String>, text: &str, config: &ClientConfig) -> Result<Self> {
        Self::from_value(name, parse_document_str(text)?, config)
    }

    pub fn from_path(name: impl Into<String>, path: &Path, config: &ClientConfig) -> Result<Self> {
        let value = load_document_from_path(path)?;
        Self::from_value(name, value, config).with_context(|| format!("load contract {}", path.display()))
    }

    /// Replaces the transport, keeping the error policy.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        let policy = self.dispatcher.policy().clone();
        self.dispatcher = Dispatcher::new(transport, policy);
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.dispatcher = self.dispatcher.with_policy(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contract version from `info.version`.
    pub fn version(&self) -> &str {
        self.contract.document().version()
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.contract.registry()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn stub(&self, name: &str) -> Option<&ClientStub> {
        self.stubs.get(name)
    }

    pub fn stubs(&self) -> &ClientStubs {
        &self.stubs
    }

    pub fn binding_table(&self) -> Vec<ServerBinding> {
        self.contract.binding_table()
    }

    /// Invokes the named stub, producing a pending caller.
    pub fn invoke(&self, name: &str, args: CallArgs) -> Result<ClientCaller, CallError> {
        let stub = self.stub(name).ok_or_else(|| BindingError::UnknownHandler {
            handler: name.to_string(),
        })?;
        stub.invoke(args)
    }

    /// Invokes and executes the named stub.
    ///
    /// Invocation errors are returned directly; the error policy applies only
    /// once a caller has been dispatched.
    pub async fn call(&self, name: &str, args: CallArgs) -> CallResult {
        match self.invoke(name, args) {
            Ok(caller) => self.dispatcher.call(caller).await,
            Err(error) => Err(error),
        }
    }

    pub async fn dispatch_all<I>(&self, callers: I) -> Vec<CallResult>
    where
        I: IntoIterator<Item = Result<ClientCaller, CallError>>,
    {
        self.dispatcher.dispatch_all(callers).await
    }

    pub fn model_to_json(&self, instance: &ModelInstance) -> Result<Value, ValidationError> {
        self.registry().marshal(instance)
    }

    pub fn json_to_model(&self, value: &Value, model: &str) -> Result<ModelInstance, ValidationError> {
        self.registry().unmarshal(value, model)
    }
}
