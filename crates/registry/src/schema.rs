//! Field and model schema types derived from contract definitions.

use bindery_types::SpecError;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

/// Prefix of local references to contract definitions.
pub const DEFINITIONS_REF_PREFIX: &str = "#/definitions/";

/// The value shape of a model field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "kebab-case")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// `type: string, format: date`, carried as an ISO-8601 calendar date.
    Date,
    /// `type: string, format: date-time`, carried as RFC 3339.
    DateTime,
    /// A nested instance of another definition (`$ref`).
    Model(String),
    Array(Box<FieldKind>),
    /// An inline object schema, kept as raw JSON.
    Object,
    /// No type declared; any JSON value.
    Any,
}

impl FieldKind {
    /// Human-readable name used in validation messages.
    pub fn describe(&self) -> String {
        match self {
            Self::String => "string".into(),
            Self::Integer => "integer".into(),
            Self::Number => "number".into(),
            Self::Boolean => "boolean".into(),
            Self::Date => "date".into(),
            Self::DateTime => "date-time".into(),
            Self::Model(name) => format!("model '{name}'"),
            Self::Array(inner) => format!("array of {}", inner.describe()),
            Self::Object => "object".into(),
            Self::Any => "any".into(),
        }
    }

    /// Resolves the kind declared by a property, item or parameter schema.
    ///
    /// `known` holds every definition name of the contract so references can be
    /// checked before the referenced model is itself resolved.
    pub fn from_schema(schema: &Value, known: &IndexSet<String>, context: &str) -> Result<Self, SpecError> {
        if let Some(reference) = schema.get("$ref") {
            let name = model_name_from_ref(reference, context)?;
            if !known.contains(&name) {
                return Err(SpecError::undefined_model(name, context));
            }
            return Ok(Self::Model(name));
        }

        let format = schema.get("format").and_then(Value::as_str);
        match schema.get("type") {
            None if schema.get("properties").is_some() => {
                Self::check_nested(schema, known, context)?;
                Ok(Self::Object)
            }
            None => Ok(Self::Any),
            Some(Value::String(ty)) => match ty.as_str() {
                "string" => Ok(match format {
                    Some("date") => Self::Date,
                    Some("date-time") => Self::DateTime,
                    _ => Self::String,
                }),
                "integer" => Ok(Self::Integer),
                "number" => Ok(Self::Number),
                "boolean" => Ok(Self::Boolean),
                "object" => {
                    Self::check_nested(schema, known, context)?;
                    Ok(Self::Object)
                }
                "array" => {
                    let items = match schema.get("items") {
                        Some(items) => Self::from_schema(items, known, &format!("{context}[items]"))?,
                        None => Self::Any,
                    };
                    Ok(Self::Array(Box::new(items)))
                }
                other => Err(SpecError::invalid_definition(context, format!("unsupported type '{other}'"))),
            },
            Some(other) => Err(SpecError::invalid_definition(
                context,
                format!("'type' must be a string, got {other}"),
            )),
        }
    }

    /// Resolves every property of an inline object so nested references are
    /// checked against `known`.
    fn check_nested(schema: &Value, known: &IndexSet<String>, context: &str) -> Result<(), SpecError> {
        if let Some(properties) = schema.get("properties") {
            let Some(properties) = properties.as_object() else {
                return Err(SpecError::invalid_definition(context, "'properties' must be a mapping"));
            };
            for (name, property) in properties {
                Self::from_schema(property, known, &format!("{context}.{name}"))?;
            }
        }
        if let Some(extra) = schema.get("additionalProperties").filter(|extra| extra.is_object()) {
            Self::from_schema(extra, known, &format!("{context}[additionalProperties]"))?;
        }
        Ok(())
    }
}

/// Extracts `Foo` from `{"$ref": "#/definitions/Foo"}`.
pub fn model_name_from_ref(reference: &Value, context: &str) -> Result<String, SpecError> {
    let Some(reference) = reference.as_str() else {
        return Err(SpecError::invalid_definition(context, "'$ref' must be a string"));
    };
    match reference.strip_prefix(DEFINITIONS_REF_PREFIX) {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(name.replace("~1", "/").replace("~0", "~")),
        _ => Err(SpecError::invalid_definition(
            context,
            format!("only local '{DEFINITIONS_REF_PREFIX}<Name>' references are supported, got '{reference}'"),
        )),
    }
}

/// Schema of one model field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    /// Raw `format` string, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub required: bool,
    /// Allowed values (`enum`); empty when unconstrained.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSchema {
    pub(crate) fn from_property(
        name: &str,
        schema: &Value,
        known: &IndexSet<String>,
        model: &str,
    ) -> Result<Self, SpecError> {
        let kind = FieldKind::from_schema(schema, known, &format!("{model}.{name}"))?;
        Ok(Self {
            name: name.to_string(),
            kind,
            format: schema.get("format").and_then(Value::as_str).map(str::to_string),
            required: false,
            enum_values: schema.get("enum").and_then(Value::as_array).cloned().unwrap_or_default(),
            description: schema.get("description").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// A named, constructible type derived from one contract definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelType {
    pub name: String,
    /// Declared fields in schema order; inherited fields come first.
    pub fields: IndexMap<String, FieldSchema>,
    /// Name of the parent model (`x-parent`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Whether `x-persist` is set; handed untouched to the persistence layer.
    pub persistent: bool,
    /// The `x-persist` value when it names a persistence target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModelType {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.values().filter(|field| field.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known(names: &[&str]) -> IndexSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn string_formats_select_date_kinds() {
        let names = known(&[]);
        assert_eq!(
            FieldKind::from_schema(&json!({"type": "string", "format": "date"}), &names, "M.a"),
            Ok(FieldKind::Date)
        );
        assert_eq!(
            FieldKind::from_schema(&json!({"type": "string", "format": "date-time"}), &names, "M.a"),
            Ok(FieldKind::DateTime)
        );
        assert_eq!(
            FieldKind::from_schema(&json!({"type": "string", "format": "email"}), &names, "M.a"),
            Ok(FieldKind::String)
        );
    }

    #[test]
    fn arrays_of_references_resolve_against_known_names() {
        let names = known(&["Bar"]);
        let kind = FieldKind::from_schema(
            &json!({"type": "array", "items": {"$ref": "#/definitions/Bar"}}),
            &names,
            "Foo.bars",
        )
        .expect("array of Bar");
        assert_eq!(kind, FieldKind::Array(Box::new(FieldKind::Model("Bar".into()))));
        assert_eq!(kind.describe(), "array of model 'Bar'");
    }

    #[test]
    fn unknown_reference_is_a_spec_error() {
        let error = FieldKind::from_schema(&json!({"$ref": "#/definitions/Nope"}), &known(&["Bar"]), "Foo.x")
            .expect_err("undefined reference");
        assert_eq!(error, SpecError::undefined_model("Nope", "Foo.x"));
    }

    #[test]
    fn references_inside_inline_objects_are_checked() {
        let nested = json!({
            "type": "object",
            "properties": {"inner": {"type": "object", "properties": {"g": {"$ref": "#/definitions/Ghost"}}}}
        });
        let error = FieldKind::from_schema(&nested, &known(&["Foo"]), "Foo.wrap").expect_err("nested ghost");
        assert_eq!(error, SpecError::undefined_model("Ghost", "Foo.wrap.inner.g"));

        let untyped = json!({"properties": {"g": {"$ref": "#/definitions/Ghost"}}});
        assert!(FieldKind::from_schema(&untyped, &known(&[]), "Foo.x").is_err());

        let map = json!({"type": "object", "additionalProperties": {"$ref": "#/definitions/Ghost"}});
        assert!(FieldKind::from_schema(&map, &known(&[]), "Foo.x").is_err());

        let fine = json!({"type": "object", "properties": {"bar": {"$ref": "#/definitions/Bar"}}});
        assert_eq!(FieldKind::from_schema(&fine, &known(&["Bar"]), "Foo.x"), Ok(FieldKind::Object));
    }

    #[test]
    fn remote_references_are_rejected() {
        let error = model_name_from_ref(&json!("other.yaml#/definitions/Bar"), "Foo.x").expect_err("remote ref");
        assert!(matches!(error, SpecError::InvalidDefinition { .. }));
    }
}
