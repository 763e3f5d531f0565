//! HTTP plumbing for generated client calls.
//!
//! - [`ClientConfig`]: timeout, retries, User-Agent and connection overrides,
//!   read from `BINDERY_CONFIG_PATH` (or the platform config dir) and the
//!   `BINDERY_*` environment variables
//! - [`Transport`]: the async seam the dispatch engine executes requests
//!   through; [`HttpTransport`] implements it with `reqwest`
//! - [`parse_response_json_strict`]: response body decoding with status and
//!   body preview in the error

pub mod config;
pub mod response;
pub mod transport;

pub use config::{ClientConfig, default_config_path};
pub use response::{JsonParseError, parse_response_json_strict};
pub use transport::{HttpTransport, Transport, build_query_pairs};
