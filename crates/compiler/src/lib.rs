//! Contract compiler and operation binder.
//!
//! A [`ContractDocument`] is compiled into a sequence of endpoint descriptors
//! ([`ContractCompiler`]), each of which is bound against the model registry
//! ([`OperationBinder`]). [`Contract::compile`] runs all three stages and
//! aborts on the first error, so a contract either compiles completely or not
//! at all.

use std::sync::Arc;

use bindery_registry::ModelRegistry;
use bindery_types::{ServerBinding, SpecError};
use tracing::info;

pub mod binder;
pub mod compiler;
pub mod document;
pub mod io;

pub use binder::{BodyParameter, BoundEndpoint, OperationBinder, OperationSchema, QueryParameter, ResponseKey, ResponseSchema};
pub use compiler::{ContractCompiler, Endpoints};
pub use document::{ConnectionOverrides, ContractDocument};
pub use io::{load_contract, load_document_from_path, parse_document_str};

/// A fully compiled and bound contract.
#[derive(Debug, Clone)]
pub struct Contract {
    document: Arc<ContractDocument>,
    registry: Arc<ModelRegistry>,
    endpoints: Vec<Arc<BoundEndpoint>>,
}

impl Contract {
    /// Builds the model registry, compiles every operation and binds it.
    pub fn compile(document: ContractDocument) -> Result<Self, SpecError> {
        let registry = ModelRegistry::build(document.definitions())?;
        let binder = OperationBinder::new(&document, &registry);

        let mut endpoints = Vec::new();
        for descriptor in ContractCompiler::new(&document).endpoints() {
            endpoints.push(Arc::new(binder.bind(descriptor?)?));
        }

        info!(
            title = document.title().unwrap_or_default(),
            version = %document.version(),
            models = registry.len(),
            endpoints = endpoints.len(),
            "compiled contract"
        );

        Ok(Self {
            document: Arc::new(document),
            registry: Arc::new(registry),
            endpoints,
        })
    }

    pub fn document(&self) -> &Arc<ContractDocument> {
        &self.document
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Bound endpoints in declaration order.
    pub fn endpoints(&self) -> &[Arc<BoundEndpoint>] {
        &self.endpoints
    }

    /// Server binding rows `(path, method, handler, mode, auth, decorators)`.
    pub fn binding_table(&self) -> Vec<ServerBinding> {
        self.endpoints
            .iter()
            .map(|endpoint| endpoint.descriptor.server_binding())
            .collect()
    }
}
