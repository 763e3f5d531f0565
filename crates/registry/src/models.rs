use bindery_types::{SpecError, ValidationError};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::debug;

use crate::{
    codec,
    schema::{FieldSchema, ModelType},
    value::{FieldValue, ModelInstance},
};

/// Registry of every model declared under a contract's `definitions`.
///
/// Built once at compile time and read-only afterwards; share it behind an
/// `Arc` when several components need it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelType>,
}

impl ModelRegistry {
    /// Builds the registry from the contract's `definitions` map.
    ///
    /// Names are registered first and fields resolved second, so a model may
    /// reference a model declared later in the document, or itself.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] when a definition is not an object schema, a
    /// reference or `x-parent` names an undefined model, inheritance is deeper
    /// than one level, or `required` names a field that does not exist.
    pub fn build(definitions: &IndexMap<String, Value>) -> Result<Self, SpecError> {
        let known: IndexSet<String> = definitions.keys().cloned().collect();

        let mut declared = IndexMap::with_capacity(definitions.len());
        for (name, raw) in definitions {
            let declaration = Declaration::parse(name, raw, &known)?;
            declared.insert(name.clone(), declaration);
        }

        let mut models = IndexMap::with_capacity(declared.len());
        for (name, declaration) in &declared {
            let model = declaration.resolve(&declared)?;
            debug!(model = %name, fields = model.fields.len(), parent = ?model.parent, "registered model");
            models.insert(name.clone(), model);
        }

        Ok(Self { models })
    }

    pub fn get(&self, name: &str) -> Option<&ModelType> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models in declaration order.
    pub fn models(&self) -> impl Iterator<Item = &ModelType> {
        self.models.values()
    }

    /// Models declaring `parent` as their `x-parent`.
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a ModelType> + 'a {
        self.models
            .values()
            .filter(move |model| model.parent.as_deref() == Some(parent))
    }

    /// Looks up the constructor of a model by name.
    pub fn factory(&self, name: &str) -> Option<ModelFactory<'_>> {
        self.models.get(name).map(|model| ModelFactory { registry: self, model })
    }

    /// Every constructor, keyed by model name.
    pub fn factories(&self) -> impl Iterator<Item = (&str, ModelFactory<'_>)> {
        self.models
            .iter()
            .map(|(name, model)| (name.as_str(), ModelFactory { registry: self, model }))
    }

    /// Shorthand for `factory(name)?.build(values)`.
    pub fn instantiate<I, K, V>(&self, name: &str, values: I) -> Result<ModelInstance, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let factory = self
            .factory(name)
            .ok_or_else(|| ValidationError::root(format!("contract has no definition for model {name}")))?;
        factory.build(values)
    }

    /// Encodes an instance as JSON, walking declared fields in schema order.
    pub fn marshal(&self, instance: &ModelInstance) -> Result<Value, ValidationError> {
        codec::marshal(self, instance, "$")
    }

    /// Decodes and validates a JSON value as an instance of `model`.
    pub fn unmarshal(&self, value: &Value, model: &str) -> Result<ModelInstance, ValidationError> {
        codec::unmarshal(self, value, model, "$")
    }

    /// Checks that `value` conforms to `model` without keeping the instance.
    pub fn validate_json(&self, model: &str, value: &Value) -> Result<(), ValidationError> {
        self.unmarshal(value, model).map(|_| ())
    }
}

/// Constructor for one model, looked up by name on the [`ModelRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct ModelFactory<'a> {
    registry: &'a ModelRegistry,
    model: &'a ModelType,
}

impl<'a> ModelFactory<'a> {
    pub fn model(&self) -> &'a ModelType {
        self.model
    }

    /// Builds an instance from field values, validating each against the schema.
    ///
    /// Values are stored in schema order regardless of the order given. A
    /// `null`, typed or raw JSON, is treated as absent; a date given for a date-time
    /// field becomes midnight UTC.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for unknown fields, values of the wrong
    /// kind, enum violations and missing required fields.
    pub fn build<I, K, V>(&self, values: I) -> Result<ModelInstance, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut given: IndexMap<String, FieldValue> = IndexMap::new();
        for (name, value) in values {
            let name = name.into();
            let path = format!("$.{name}");
            let Some(field) = self.model.field(&name) else {
                return Err(ValidationError::new(
                    path,
                    format!("'{name}' is not a field of model {}", self.model.name),
                ));
            };
            let value = value.into();
            if matches!(value, FieldValue::Null | FieldValue::Json(Value::Null)) {
                continue;
            }
            let checked = codec::check_value(self.registry, &field.kind, value, &path)?;
            codec::check_enum(field, &checked, &path)?;
            given.insert(name, checked);
        }

        let mut ordered = IndexMap::with_capacity(given.len());
        for field in self.model.fields.values() {
            match given.shift_remove(&field.name) {
                Some(value) => {
                    ordered.insert(field.name.clone(), value);
                }
                None if field.required => {
                    return Err(ValidationError::root(format!("'{}' is a required property", field.name)));
                }
                None => {}
            }
        }

        Ok(ModelInstance::new(self.model.name.clone(), ordered))
    }
}

/// A definition after the first pass: its own fields resolved, parent not yet merged.
struct Declaration {
    model: ModelType,
    required: Vec<String>,
}

impl Declaration {
    fn parse(name: &str, raw: &Value, known: &IndexSet<String>) -> Result<Self, SpecError> {
        let object = raw
            .as_object()
            .ok_or_else(|| SpecError::invalid_definition(name, "definition must be an object schema"))?;

        if let Some(ty) = object.get("type")
            && ty.as_str() != Some("object")
        {
            return Err(SpecError::invalid_definition(
                name,
                format!("only 'object' definitions are constructible, got type {ty}"),
            ));
        }

        let mut fields = IndexMap::new();
        match object.get("properties") {
            None => {}
            Some(Value::Object(properties)) => {
                for (field_name, schema) in properties {
                    let field = FieldSchema::from_property(field_name, schema, known, name)?;
                    fields.insert(field_name.clone(), field);
                }
            }
            Some(_) => return Err(SpecError::invalid_definition(name, "'properties' must be an object")),
        }

        let required = match object.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|entry| {
                    entry
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| SpecError::invalid_definition(name, "'required' entries must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(SpecError::invalid_definition(name, "'required' must be an array")),
        };

        let parent = match object.get("x-parent") {
            None => None,
            Some(Value::String(parent)) if parent == name => {
                return Err(SpecError::invalid_definition(name, "a model cannot be its own x-parent"));
            }
            Some(Value::String(parent)) if !known.contains(parent) => {
                return Err(SpecError::undefined_model(parent, format!("x-parent of {name}")));
            }
            Some(Value::String(parent)) => Some(parent.clone()),
            Some(_) => return Err(SpecError::invalid_definition(name, "'x-parent' must be a model name")),
        };

        let (persistent, persist_hint) = match object.get("x-persist") {
            None => (false, None),
            Some(Value::Bool(flag)) => (*flag, None),
            Some(Value::String(target)) => (!target.is_empty(), Some(target.clone())),
            Some(_) => return Err(SpecError::invalid_definition(name, "'x-persist' must be a boolean or a string")),
        };

        Ok(Self {
            model: ModelType {
                name: name.to_string(),
                fields,
                parent,
                persistent,
                persist_hint,
                description: object.get("description").and_then(Value::as_str).map(str::to_string),
            },
            required,
        })
    }

    /// Merges the parent's fields (single level) and applies the `required` lists.
    fn resolve(&self, declared: &IndexMap<String, Declaration>) -> Result<ModelType, SpecError> {
        let mut model = self.model.clone();
        let mut required = Vec::new();

        if let Some(parent_name) = &self.model.parent {
            let parent = declared
                .get(parent_name)
                .ok_or_else(|| SpecError::undefined_model(parent_name, format!("x-parent of {}", model.name)))?;
            if parent.model.parent.is_some() {
                return Err(SpecError::invalid_definition(
                    &model.name,
                    format!("parent '{parent_name}' has a parent itself; only single-level inheritance is supported"),
                ));
            }

            let mut fields = parent.model.fields.clone();
            for (name, field) in &self.model.fields {
                fields.insert(name.clone(), field.clone());
            }
            model.fields = fields;
            required.extend(parent.required.iter().cloned());
        }

        for name in &self.required {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }

        for name in &required {
            let field = model.fields.get_mut(name).ok_or_else(|| {
                SpecError::invalid_definition(&model.name, format!("required field '{name}' is not declared"))
            })?;
            field.required = true;
        }

        Ok(model)
    }
}
