//! Pending requests and response decoding.

use std::sync::Arc;

use bindery_api::parse_response_json_strict;
use bindery_compiler::{BoundEndpoint, ResponseSchema};
use bindery_registry::ModelRegistry;
use bindery_types::{CallError, OutboundRequest, RawResponse, ValidationError};
use serde_json::Value;

use crate::dispatch::{CallResult, Dispatcher, Reply, ReplyPayload};

/// A fully assembled request produced by a client stub.
///
/// Nothing is sent until the caller is handed to a [`Dispatcher`]; execution
/// consumes it.
#[derive(Debug)]
pub struct ClientCaller {
    endpoint: Arc<BoundEndpoint>,
    registry: Arc<ModelRegistry>,
    request: OutboundRequest,
}

impl ClientCaller {
    pub(crate) fn new(endpoint: Arc<BoundEndpoint>, registry: Arc<ModelRegistry>, request: OutboundRequest) -> Self {
        Self {
            endpoint,
            registry,
            request,
        }
    }

    pub fn request(&self) -> &OutboundRequest {
        &self.request
    }

    pub fn endpoint(&self) -> &BoundEndpoint {
        &self.endpoint
    }

    /// Client binding name of the endpoint this caller targets.
    pub fn handler(&self) -> &str {
        self.endpoint.handler_client().unwrap_or_default()
    }

    /// Executes the request through `dispatcher`.
    pub async fn call(self, dispatcher: &Dispatcher) -> CallResult {
        dispatcher.call(self).await
    }

    /// Decodes `response` against the schema declared for its status.
    pub(crate) fn decode(&self, response: RawResponse) -> CallResult {
        let RawResponse { status, body } = response;
        let Some(schema) = self.endpoint.schema.response_for(status) else {
            let body = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            return Err(CallError::UnexpectedReply { status, body });
        };

        let payload = match schema {
            ResponseSchema::Empty => ReplyPayload::Empty,
            ResponseSchema::Json(_) => ReplyPayload::Json(parse_body(&body, status)?),
            ResponseSchema::Model(model) => {
                let value = parse_body(&body, status)?;
                ReplyPayload::Model(self.registry.unmarshal(&value, model)?)
            }
            ResponseSchema::List(model) => {
                let value = parse_body(&body, status)?;
                let Value::Array(items) = value else {
                    return Err(ValidationError::root(format!("{value} is not of type 'array'")).into());
                };
                let mut instances = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let instance = self
                        .registry
                        .unmarshal(item, model)
                        .map_err(|error| item_error(error, index))?;
                    instances.push(instance);
                }
                ReplyPayload::Models(instances)
            }
        };

        Ok(Reply { status, payload })
    }
}

fn parse_body(body: &str, status: u16) -> Result<Value, ValidationError> {
    parse_response_json_strict(body, Some(status)).map_err(|error| ValidationError::root(error.to_string()))
}

/// Re-roots an item error under its array index: `$.a` becomes `$[2].a`.
fn item_error(error: ValidationError, index: usize) -> ValidationError {
    let rest = error.path.strip_prefix('$').unwrap_or(&error.path);
    ValidationError::new(format!("$[{index}]{rest}"), error.message)
}
