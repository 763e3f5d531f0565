//! Recursive JSON encoding and decoding of model instances.

use bindery_types::ValidationError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::{
    models::ModelRegistry,
    schema::{FieldKind, FieldSchema},
    value::{FieldValue, ModelInstance, json_type_name},
};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn marshal(registry: &ModelRegistry, instance: &ModelInstance, path: &str) -> Result<Value, ValidationError> {
    let model = registry.get(instance.model_name()).ok_or_else(|| {
        ValidationError::new(
            path,
            format!("contract has no definition for model {}", instance.model_name()),
        )
    })?;

    let mut out = Map::new();
    for name in model.fields.keys() {
        if let Some(value) = instance.get(name) {
            out.insert(name.clone(), encode(registry, value, &format!("{path}.{name}"))?);
        }
    }
    Ok(Value::Object(out))
}

fn encode(registry: &ModelRegistry, value: &FieldValue, path: &str) -> Result<Value, ValidationError> {
    Ok(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(flag) => Value::Bool(*flag),
        FieldValue::Integer(number) => Value::Number(Number::from(*number)),
        FieldValue::Number(number) => Number::from_f64(*number)
            .map(Value::Number)
            .ok_or_else(|| ValidationError::new(path, format!("{number} is not a finite number")))?,
        FieldValue::String(text) => Value::String(text.clone()),
        FieldValue::Date(date) => Value::String(date.format(DATE_FORMAT).to_string()),
        FieldValue::DateTime(datetime) => Value::String(datetime.to_rfc3339()),
        FieldValue::Model(instance) => marshal(registry, instance, path)?,
        FieldValue::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| encode(registry, item, &format!("{path}[{index}]")))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        FieldValue::Json(raw) => raw.clone(),
    })
}

pub(crate) fn unmarshal(
    registry: &ModelRegistry,
    value: &Value,
    model_name: &str,
    path: &str,
) -> Result<ModelInstance, ValidationError> {
    let model = registry
        .get(model_name)
        .ok_or_else(|| ValidationError::new(path, format!("contract has no definition for model {model_name}")))?;
    let Value::Object(object) = value else {
        return Err(ValidationError::new(
            path,
            format!("{} is not of type 'object' (model {model_name})", json_type_name(value)),
        ));
    };

    let mut values = IndexMap::with_capacity(model.fields.len());
    for field in model.fields.values() {
        let field_path = format!("{path}.{}", field.name);
        match object.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(ValidationError::new(path, format!("'{}' is a required property", field.name)));
            }
            None | Some(Value::Null) => {}
            Some(raw) => {
                let decoded = decode(registry, &field.kind, raw, &field_path)?;
                check_enum(field, &decoded, &field_path)?;
                values.insert(field.name.clone(), decoded);
            }
        }
    }

    Ok(ModelInstance::new(model_name, values))
}

fn decode(registry: &ModelRegistry, kind: &FieldKind, raw: &Value, path: &str) -> Result<FieldValue, ValidationError> {
    let mismatch = || ValidationError::new(path, format!("{raw} is not of type '{}'", kind.describe()));
    match kind {
        FieldKind::String => raw.as_str().map(FieldValue::from).ok_or_else(mismatch),
        FieldKind::Integer => raw.as_i64().map(FieldValue::Integer).ok_or_else(mismatch),
        FieldKind::Number => raw.as_f64().map(FieldValue::Number).ok_or_else(mismatch),
        FieldKind::Boolean => raw.as_bool().map(FieldValue::Bool).ok_or_else(mismatch),
        FieldKind::Date => {
            let text = raw.as_str().ok_or_else(mismatch)?;
            parse_date(text)
                .map(FieldValue::Date)
                .ok_or_else(|| ValidationError::new(path, format!("'{text}' is not a 'date'")))
        }
        FieldKind::DateTime => {
            let text = raw.as_str().ok_or_else(mismatch)?;
            parse_datetime(text)
                .map(FieldValue::DateTime)
                .ok_or_else(|| ValidationError::new(path, format!("'{text}' is not a 'date-time'")))
        }
        FieldKind::Model(name) => unmarshal(registry, raw, name, path).map(FieldValue::Model),
        FieldKind::Array(inner) => {
            let items = raw.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .enumerate()
                .map(|(index, item)| decode(registry, inner, item, &format!("{path}[{index}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Array)
        }
        FieldKind::Object => match raw {
            Value::Object(_) => Ok(FieldValue::Json(raw.clone())),
            _ => Err(mismatch()),
        },
        FieldKind::Any => Ok(FieldValue::Json(raw.clone())),
    }
}

/// Validates a constructor argument and normalizes it to the representation
/// `unmarshal` would produce for the same field.
pub(crate) fn check_value(
    registry: &ModelRegistry,
    kind: &FieldKind,
    value: FieldValue,
    path: &str,
) -> Result<FieldValue, ValidationError> {
    let mismatch = |value: &FieldValue| {
        ValidationError::new(
            path,
            format!("{} is not of type '{}'", value.type_name(), kind.describe()),
        )
    };

    match (kind, value) {
        (FieldKind::String, value @ FieldValue::String(_))
        | (FieldKind::Integer, value @ FieldValue::Integer(_))
        | (FieldKind::Number, value @ FieldValue::Number(_))
        | (FieldKind::Boolean, value @ FieldValue::Bool(_))
        | (FieldKind::Date, value @ FieldValue::Date(_))
        | (FieldKind::DateTime, value @ FieldValue::DateTime(_)) => Ok(value),
        (FieldKind::Number, FieldValue::Integer(number)) => Ok(FieldValue::Number(number as f64)),
        (FieldKind::Date, FieldValue::String(text)) => parse_date(&text)
            .map(FieldValue::Date)
            .ok_or_else(|| ValidationError::new(path, format!("'{text}' is not a 'date'"))),
        (FieldKind::DateTime, FieldValue::Date(date)) => Ok(FieldValue::DateTime(midnight_utc(date))),
        (FieldKind::DateTime, FieldValue::String(text)) => parse_datetime(&text)
            .map(FieldValue::DateTime)
            .ok_or_else(|| ValidationError::new(path, format!("'{text}' is not a 'date-time'"))),
        (FieldKind::Model(expected), FieldValue::Model(instance)) => {
            if instance.model_name() == expected {
                Ok(FieldValue::Model(instance))
            } else {
                Err(ValidationError::new(
                    path,
                    format!("expected an instance of {expected}, got {}", instance.model_name()),
                ))
            }
        }
        (FieldKind::Array(inner), FieldValue::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| check_value(registry, inner, item, &format!("{path}[{index}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(FieldValue::Array),
        (FieldKind::Object, value @ FieldValue::Json(Value::Object(_))) => Ok(value),
        (FieldKind::Any, value) => encode(registry, &value, path).map(FieldValue::Json),
        (_, value) => Err(mismatch(&value)),
    }
}

pub(crate) fn check_enum(field: &FieldSchema, value: &FieldValue, path: &str) -> Result<(), ValidationError> {
    if field.enum_values.is_empty() {
        return Ok(());
    }
    let allowed = &field.enum_values;
    let (encoded, found) = match value {
        FieldValue::String(text) => (Value::String(text.clone()), None),
        FieldValue::Integer(number) => (Value::Number(Number::from(*number)), None),
        FieldValue::Bool(flag) => (Value::Bool(*flag), None),
        FieldValue::Json(raw) => (raw.clone(), None),
        // Numbers and dates compare by value, not by their JSON text.
        FieldValue::Number(number) => (
            Number::from_f64(*number).map_or(Value::Null, Value::Number),
            Some(allowed.iter().any(|candidate| candidate.as_f64() == Some(*number))),
        ),
        FieldValue::Date(date) => (
            Value::String(date.format(DATE_FORMAT).to_string()),
            Some(allowed.iter().any(|candidate| candidate.as_str().and_then(parse_date) == Some(*date))),
        ),
        FieldValue::DateTime(moment) => (
            Value::String(moment.to_rfc3339()),
            Some(allowed.iter().any(|candidate| candidate.as_str().and_then(parse_datetime) == Some(*moment))),
        ),
        FieldValue::Null | FieldValue::Model(_) | FieldValue::Array(_) => return Ok(()),
    };
    if found.unwrap_or_else(|| allowed.contains(&encoded)) {
        return Ok(());
    }
    let allowed = allowed
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(ValidationError::new(path, format!("{encoded} is not one of [{allowed}]")))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// RFC 3339, or a bare calendar date read as midnight UTC.
fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .or_else(|| parse_date(text).map(midnight_utc))
}

fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)).fixed_offset()
}
