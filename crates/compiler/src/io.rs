//! Reading contract documents from text or disk.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;

use crate::document::{ConnectionOverrides, ContractDocument};

/// Parses a contract from YAML or JSON text.
///
/// YAML is tried first (JSON is a subset of it); mapping keys that YAML reads
/// as numbers or booleans, such as response codes written `200:`, become
/// strings.
pub fn parse_document_str(text: &str) -> Result<Value> {
    match serde_yaml::from_str::<YamlValue>(text) {
        Ok(yaml) => yaml_to_json(yaml).context("could not convert yaml to json"),
        Err(yaml_err) => serde_json::from_str(text)
            .with_context(|| format!("unable to parse contract as yaml ({yaml_err}) or json")),
    }
}

/// Reads and parses a contract file.
pub fn load_document_from_path(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_document_str(&text).with_context(|| format!("parse {}", path.display()))
}

/// Reads a contract file into a [`ContractDocument`] and applies overrides.
pub fn load_contract(path: &Path, overrides: &ConnectionOverrides) -> Result<ContractDocument> {
    let raw = load_document_from_path(path)?;
    let document = ContractDocument::from_value(raw).with_context(|| format!("invalid contract {}", path.display()))?;
    Ok(document.with_overrides(overrides))
}

fn yaml_to_json(value: YamlValue) -> Result<Value> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(flag) => Value::Bool(flag),
        YamlValue::Number(number) => {
            if let Some(int) = number.as_i64() {
                Value::Number(Number::from(int))
            } else if let Some(uint) = number.as_u64() {
                Value::Number(Number::from(uint))
            } else {
                let float = number.as_f64().unwrap_or(f64::NAN);
                match Number::from_f64(float) {
                    Some(number) => Value::Number(number),
                    None => bail!("non-finite number {float} cannot be represented in json"),
                }
            }
        }
        YamlValue::String(text) => Value::String(text),
        YamlValue::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect::<Result<_>>()?),
        YamlValue::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn mapping_key(key: YamlValue) -> Result<String> {
    Ok(match key {
        YamlValue::String(text) => text,
        YamlValue::Number(number) => number.to_string(),
        YamlValue::Bool(flag) => flag.to_string(),
        YamlValue::Null => "null".to_string(),
        other => bail!("unsupported mapping key {other:?}"),
    })
}
