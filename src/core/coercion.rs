//! Conversion of operator-entered text into typed parameter values.

use crate::domain::model::{Operation, ParamType, Parameter};
use crate::utils::error::{ManagerError, Result};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Coerces raw text for `param`. `Ok(None)` means "no value supplied".
///
/// Arrays are one item per line: lines are trimmed, blank lines dropped and
/// each item coerced with the declared item type. Blank input yields an empty
/// array rather than no value.
pub fn coerce_value(operation: &str, param: &Parameter, raw: Option<&str>) -> Result<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    match param.param_type {
        ParamType::Array => {
            let item_type = param.items.unwrap_or(ParamType::String);
            let mut items = Vec::new();
            for line in raw.trim().lines().map(str::trim).filter(|l| !l.is_empty()) {
                if let Some(item) = coerce_scalar(operation, &param.name, item_type, line)? {
                    items.push(item);
                }
            }
            Ok(Some(Value::Array(items)))
        }
        ParamType::String | ParamType::Any => Ok(Some(Value::String(raw.to_string()))),
        other => coerce_scalar(operation, &param.name, other, raw),
    }
}

fn coerce_scalar(
    operation: &str,
    name: &str,
    param_type: ParamType,
    raw: &str,
) -> Result<Option<Value>> {
    let trimmed = raw.trim();
    let invalid = |expected: &str| ManagerError::InvalidParameter {
        operation: operation.to_string(),
        parameter: name.to_string(),
        reason: format!("expected {}, got \"{}\"", expected, trimmed),
    };

    match param_type {
        ParamType::Integer => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            let value: i64 = trimmed.parse().map_err(|_| invalid("an integer"))?;
            Ok(Some(Value::from(value)))
        }
        ParamType::Number => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            let value: f64 = trimmed.parse().map_err(|_| invalid("a number"))?;
            Number::from_f64(value)
                .map(|n| Some(Value::Number(n)))
                .ok_or_else(|| invalid("a finite number"))
        }
        ParamType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "1" | "true" | "yes" | "on" => Ok(Some(Value::Bool(true))),
            "0" | "false" | "no" | "off" => Ok(Some(Value::Bool(false))),
            _ => Err(invalid("a boolean")),
        },
        ParamType::Object => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            let value: Value = serde_json::from_str(trimmed).map_err(|_| invalid("a JSON object"))?;
            if value.is_object() {
                Ok(Some(value))
            } else {
                Err(invalid("a JSON object"))
            }
        }
        // nested arrays are not expressible one item per line
        ParamType::String | ParamType::Any | ParamType::Array => {
            Ok(Some(Value::String(trimmed.to_string())))
        }
    }
}

/// Coerces every declared parameter found in `raw`. Undeclared keys are kept
/// as plain strings.
pub fn coerce_inputs(operation: &Operation, raw: &BTreeMap<String, String>) -> Result<Map<String, Value>> {
    let mut values = Map::new();

    for (name, text) in raw {
        let value = match operation.parameter(name) {
            Some(param) => coerce_value(&operation.name, param, Some(text))?,
            None => Some(Value::String(text.clone())),
        };
        if let Some(value) = value {
            values.insert(name.clone(), value);
        }
    }

    Ok(values)
}
