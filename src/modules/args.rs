//! Helpers for decoding exported-function arguments

use serde_json::Value;

use crate::application::errors::ModuleError;
use crate::domain::traits::ConfigData;

/// Render a scalar argument as a string. Null and missing give `None`.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn string_arg(args: &[Value], index: usize, name: &str) -> Result<String, ModuleError> {
    scalar(args.get(index))
        .ok_or_else(|| ModuleError::InvalidArguments(format!("missing argument `{}`", name)))
}

pub fn optional_string_arg(args: &[Value], index: usize) -> Option<String> {
    scalar(args.get(index))
}

pub fn bool_arg(args: &[Value], index: usize) -> bool {
    args.get(index).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// An object argument, with every value rendered as a string
pub fn map_arg(args: &[Value], index: usize, name: &str) -> Result<ConfigData, ModuleError> {
    let Some(Value::Object(map)) = args.get(index) else {
        return Err(ModuleError::InvalidArguments(format!(
            "argument `{}` must be an object",
            name
        )));
    };
    Ok(map
        .iter()
        .map(|(k, v)| (k.clone(), scalar(Some(v)).unwrap_or_default()))
        .collect())
}

pub fn list_arg(args: &[Value], index: usize, name: &str) -> Result<Vec<String>, ModuleError> {
    let Some(Value::Array(items)) = args.get(index) else {
        return Err(ModuleError::InvalidArguments(format!(
            "argument `{}` must be an array",
            name
        )));
    };
    Ok(items.iter().filter_map(|v| scalar(Some(v))).collect())
}
