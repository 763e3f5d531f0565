//! Attaches request and response schemas to compiled endpoints.

use std::{fmt, str::FromStr};

use bindery_registry::{FieldKind, ModelRegistry, schema::model_name_from_ref};
use bindery_types::{EndpointDescriptor, ParamLocation, ParamMode, SpecError};
use indexmap::{IndexMap, IndexSet};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::document::ContractDocument;

/// Key of a declared response: an HTTP status code or `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKey {
    Status(u16),
    Default,
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{code}"),
            Self::Default => f.write_str("default"),
        }
    }
}

impl FromStr for ResponseKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "default" {
            return Ok(Self::Default);
        }
        s.parse::<u16>()
            .ok()
            .filter(|code| (100..600).contains(code))
            .map(Self::Status)
            .ok_or_else(|| format!("'{s}' is neither an HTTP status code nor 'default'"))
    }
}

impl Serialize for ResponseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Shape of a response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "schema", rename_all = "lowercase")]
pub enum ResponseSchema {
    /// No schema declared; the body is ignored.
    Empty,
    /// A single instance of a definition.
    Model(String),
    /// An array of instances of a definition.
    List(String),
    /// Any other inline schema, handed back as raw JSON.
    Json(Value),
}

/// The single body parameter of a Body-mode operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodyParameter {
    pub name: String,
    pub model: String,
    pub required: bool,
}

/// One query parameter of a Query-mode operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request and response schemas of one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationSchema {
    pub body: Option<BodyParameter>,
    pub query: Vec<QueryParameter>,
    pub responses: IndexMap<ResponseKey, ResponseSchema>,
}

impl OperationSchema {
    /// Schema declared for `status`, falling back to `default`.
    pub fn response_for(&self, status: u16) -> Option<&ResponseSchema> {
        self.responses
            .get(&ResponseKey::Status(status))
            .or_else(|| self.responses.get(&ResponseKey::Default))
    }

    pub fn query_parameter(&self, name: &str) -> Option<&QueryParameter> {
        self.query.iter().find(|parameter| parameter.name == name)
    }
}

/// An endpoint descriptor together with its operation schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundEndpoint {
    pub descriptor: EndpointDescriptor,
    pub schema: OperationSchema,
}

impl BoundEndpoint {
    pub fn handler_client(&self) -> Option<&str> {
        self.descriptor.handler_client.as_deref()
    }

    pub fn label(&self) -> String {
        self.descriptor.label()
    }
}

/// Binds descriptors against the model registry.
pub struct OperationBinder<'a> {
    document: &'a ContractDocument,
    registry: &'a ModelRegistry,
    known: IndexSet<String>,
}

impl<'a> OperationBinder<'a> {
    pub fn new(document: &'a ContractDocument, registry: &'a ModelRegistry) -> Self {
        let known = registry.models().map(|model| model.name.clone()).collect();
        Self {
            document,
            registry,
            known,
        }
    }

    /// Resolves the body model, query parameter kinds and response schemas.
    ///
    /// # Errors
    ///
    /// A body parameter whose schema is not a `$ref` to a definition, any
    /// reference to an undefined model, and malformed `responses` are
    /// [`SpecError`]s.
    pub fn bind(&self, descriptor: EndpointDescriptor) -> Result<BoundEndpoint, SpecError> {
        let label = descriptor.label();
        let mut schema = OperationSchema::default();

        match descriptor.param_mode {
            ParamMode::None => {}
            ParamMode::Body => {
                let parameter = descriptor
                    .parameters
                    .iter()
                    .find(|parameter| parameter.location == ParamLocation::Body)
                    .ok_or_else(|| SpecError::unsupported_parameters(&label, "body mode without a body parameter"))?;
                let model = match parameter.raw.get("schema") {
                    Some(body_schema) if body_schema.get("$ref").is_some() => {
                        self.model_reference(&body_schema["$ref"], &format!("body parameter of {label}"))?
                    }
                    _ => {
                        return Err(SpecError::unsupported_parameters(
                            &label,
                            format!("body parameter '{}' must reference a definition", parameter.name),
                        ));
                    }
                };
                schema.body = Some(BodyParameter {
                    name: parameter.name.clone(),
                    model,
                    required: parameter.required,
                });
            }
            ParamMode::Query => {
                for parameter in &descriptor.parameters {
                    let context = format!("query parameter '{}' of {label}", parameter.name);
                    schema.query.push(QueryParameter {
                        name: parameter.name.clone(),
                        kind: FieldKind::from_schema(&parameter.raw, &self.known, &context)?,
                        required: parameter.required,
                        description: parameter
                            .raw
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    });
                }
            }
        }

        schema.responses = self.bind_responses(&descriptor, &label)?;

        Ok(BoundEndpoint { descriptor, schema })
    }

    fn bind_responses(
        &self,
        descriptor: &EndpointDescriptor,
        label: &str,
    ) -> Result<IndexMap<ResponseKey, ResponseSchema>, SpecError> {
        let mut responses = IndexMap::new();
        let Some(declared) = self.operation(descriptor).and_then(|op| op.get("responses")) else {
            return Ok(responses);
        };
        let Some(declared) = declared.as_object() else {
            return Err(SpecError::invalid_document(format!("'responses' of {label} must be a mapping")));
        };

        for (key, response) in declared {
            if key.starts_with("x-") {
                continue;
            }
            let status = ResponseKey::from_str(key)
                .map_err(|reason| SpecError::invalid_document(format!("{label}: {reason}")))?;
            let response = match response.get("$ref").and_then(Value::as_str) {
                Some(reference) => self.document.resolve_local_ref(reference).ok_or_else(|| {
                    SpecError::invalid_document(format!("{label}: cannot resolve response reference '{reference}'"))
                })?,
                None => response,
            };
            let context = format!("response {status} of {label}");
            responses.insert(status, self.response_schema(response.get("schema"), &context)?);
        }
        Ok(responses)
    }

    fn response_schema(&self, schema: Option<&Value>, context: &str) -> Result<ResponseSchema, SpecError> {
        let Some(schema) = schema else {
            return Ok(ResponseSchema::Empty);
        };
        if let Some(reference) = schema.get("$ref") {
            return self.model_reference(reference, context).map(ResponseSchema::Model);
        }
        if schema.get("type").and_then(Value::as_str) == Some("array")
            && let Some(reference) = schema.get("items").and_then(|items| items.get("$ref"))
        {
            return self.model_reference(reference, context).map(ResponseSchema::List);
        }
        // Nested references inside inline schemas must still name real definitions.
        FieldKind::from_schema(schema, &self.known, context)?;
        Ok(ResponseSchema::Json(schema.clone()))
    }

    fn model_reference(&self, reference: &Value, context: &str) -> Result<String, SpecError> {
        let name = model_name_from_ref(reference, context)?;
        if self.registry.contains(&name) {
            Ok(name)
        } else {
            Err(SpecError::undefined_model(name, context))
        }
    }

    fn operation(&self, descriptor: &EndpointDescriptor) -> Option<&'a Value> {
        self.document
            .paths()
            .get(&descriptor.path)?
            .as_object()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(descriptor.method.as_str()))
            .map(|(_, operation)| operation)
    }
}
