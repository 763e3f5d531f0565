//! # Bindery Engine
//!
//! Client side of a compiled contract: generated stubs, pending callers and
//! the dispatcher that executes them.
//!
//! ## Flow
//!
//! 1. [`ClientStubs::generate`] creates one [`ClientStub`] per operation that
//!    declares `x-bind-client`.
//! 2. [`ClientStub::invoke`] checks the arguments against the operation's
//!    parameter mode and returns a [`ClientCaller`] holding the assembled
//!    request. No I/O happens here.
//! 3. A [`Dispatcher`] sends callers through a [`bindery_api::Transport`] and
//!    decodes each response against the schema declared for its status.
//!    [`Dispatcher::dispatch_all`] runs a batch concurrently on the current
//!    task and returns results in input order.
//!
//! [`Api`] bundles all of the above for a single contract.
//!
//! ```rust,no_run
//! use bindery_api::ClientConfig;
//! use bindery_engine::{Api, CallArgs};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let api = Api::from_path("login", "contracts/login.yaml".as_ref(), &ClientConfig::load()?)?;
//! let reply = api.call("version", CallArgs::new()).await?;
//! println!("{}", reply.to_json(api.registry())?);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod caller;
pub mod dispatch;
pub mod stubs;

pub use api::Api;
pub use caller::ClientCaller;
pub use dispatch::{CallResult, Dispatcher, ErrorPolicy, Reply, ReplyPayload};
pub use stubs::{CallArgs, ClientStub, ClientStubs};
