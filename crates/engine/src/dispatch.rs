//! Execution of client callers, one at a time or as a batch.
//!
//! A [`Dispatcher`] owns the transport and the error policy. Every call
//! produces a [`CallResult`]; failures are values, never panics, and a failing
//! caller in a batch does not affect its siblings.

use std::{fmt, sync::Arc, time::Instant};

use bindery_api::Transport;
use bindery_registry::{ModelInstance, ModelRegistry};
use bindery_types::{CallError, ValidationError};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::caller::ClientCaller;

/// Outcome of one call.
pub type CallResult = Result<Reply, CallError>;

/// A decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub payload: ReplyPayload,
}

/// Response body decoded against the schema declared for the status.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    Empty,
    Model(ModelInstance),
    Models(Vec<ModelInstance>),
    Json(Value),
}

impl Reply {
    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            payload: ReplyPayload::Json(value),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn model(&self) -> Option<&ModelInstance> {
        match &self.payload {
            ReplyPayload::Model(instance) => Some(instance),
            _ => None,
        }
    }

    /// Renders the payload as JSON, marshaling model instances.
    pub fn to_json(&self, registry: &ModelRegistry) -> Result<Value, ValidationError> {
        match &self.payload {
            ReplyPayload::Empty => Ok(Value::Null),
            ReplyPayload::Model(instance) => registry.marshal(instance),
            ReplyPayload::Models(instances) => instances
                .iter()
                .map(|instance| registry.marshal(instance))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ReplyPayload::Json(value) => Ok(value.clone()),
        }
    }
}

type RecoverFn = dyn Fn(&CallError) -> Reply + Send + Sync;

/// What the dispatcher does with a failed call.
#[derive(Clone, Default)]
pub enum ErrorPolicy {
    /// Return the error as the call result.
    #[default]
    Propagate,
    /// Replace the error with the reply produced by the handler.
    Recover(Arc<RecoverFn>),
}

impl ErrorPolicy {
    pub fn recover<F>(handler: F) -> Self
    where
        F: Fn(&CallError) -> Reply + Send + Sync + 'static,
    {
        Self::Recover(Arc::new(handler))
    }

    /// Recovers every error into its JSON error reply, keeping its status.
    pub fn error_replies() -> Self {
        Self::recover(|error| {
            let reply = error.to_reply();
            let status = reply.status;
            Reply::json(status, serde_json::to_value(reply).unwrap_or(Value::Null))
        })
    }

    /// Applies the policy to a finished call.
    pub fn apply(&self, result: CallResult) -> CallResult {
        match (self, result) {
            (Self::Recover(handler), Err(error)) => Ok(handler(&error)),
            (_, result) => result,
        }
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagate => f.write_str("Propagate"),
            Self::Recover(_) => f.write_str("Recover(..)"),
        }
    }
}

/// Executes callers over a [`Transport`].
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    policy: ErrorPolicy,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("policy", &self.policy).finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, policy: ErrorPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &ErrorPolicy {
        &self.policy
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sends the caller's request and decodes the response.
    pub async fn call(&self, caller: ClientCaller) -> CallResult {
        let result = self.execute(&caller).await;
        self.policy.apply(result)
    }

    async fn execute(&self, caller: &ClientCaller) -> CallResult {
        let started = Instant::now();
        let request = caller.request();
        let response = self.transport.execute(request).await?;
        let status = response.status;
        let result = caller.decode(response);

        match &result {
            Ok(_) => debug!(
                handler = %caller.handler(),
                method = %request.method,
                url = %request.url,
                status,
                duration_ms = started.elapsed().as_millis() as u64,
                "call completed"
            ),
            Err(error) => warn!(
                handler = %caller.handler(),
                method = %request.method,
                url = %request.url,
                status,
                error = %error,
                "call failed"
            ),
        }
        result
    }

    /// Executes a batch concurrently on the current task.
    ///
    /// Every request is issued before any is awaited; results come back in
    /// input order. Entries that are already errors (for example a stub
    /// invocation that failed validation) are returned as they are, without
    /// sending anything; the error policy only sees call failures.
    pub async fn dispatch_all<I>(&self, callers: I) -> Vec<CallResult>
    where
        I: IntoIterator<Item = Result<ClientCaller, CallError>>,
    {
        let started = Instant::now();
        let pending = callers.into_iter().map(|caller| async move {
            match caller {
                Ok(caller) => self.call(caller).await,
                Err(error) => Err(error),
            }
        });
        let results = join_all(pending).await;

        let failed = results.iter().filter(|result| result.is_err()).count();
        info!(
            calls = results.len(),
            failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "batch dispatched"
        );
        results
    }
}
