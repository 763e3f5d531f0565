//! Model registry for contract-defined data shapes.
//!
//! Every entry under a contract's `definitions` becomes a [`ModelType`]. The
//! [`ModelRegistry`] maps model names to [`ModelFactory`] constructors and
//! converts [`ModelInstance`] values to and from JSON:
//!
//! - nested `$ref` fields become nested instances, not raw maps
//! - `x-parent` merges a parent's fields into the child (single level)
//! - `format: date` / `format: date-time` fields are carried as chrono values
//!   and encoded as ISO-8601 strings

mod codec;
pub mod models;
pub mod schema;
pub mod value;

pub use models::{ModelFactory, ModelRegistry};
pub use schema::{DEFINITIONS_REF_PREFIX, FieldKind, FieldSchema, ModelType};
pub use value::{FieldValue, ModelInstance};
