//! Inbound request validation.
//!
//! Turns the raw POST body into a [`PriceRequest`] before anything is
//! sent upstream. Pure: no I/O, no logging.

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::types::{GatewayError, PriceRequest, PriceRequestItem, PricingMethod};

type ValidationResult<T> = Result<T, GatewayError>;

fn invalid(msg: impl Into<String>) -> GatewayError {
    GatewayError::Validation(msg.into())
}

/// Parse and validate a raw request body.
pub fn validate(body: &[u8]) -> ValidationResult<PriceRequest> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| invalid(format!("Body is not valid JSON: {e}")))?;
    validate_value(&value)
}

/// Validate an already-decoded JSON body.
pub fn validate_value(body: &Value) -> ValidationResult<PriceRequest> {
    let obj = body
        .as_object()
        .ok_or_else(|| invalid("Body must be a JSON object"))?;

    let items = match obj.get("items") {
        None | Some(Value::Null) => return Err(invalid("Missing required field `items`")),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid("`items` must be an array")),
    };
    if items.is_empty() {
        return Err(invalid("`items` must not be empty"));
    }

    let mut seen = HashSet::with_capacity(items.len());
    let mut parsed = Vec::with_capacity(items.len());
    for (idx, raw) in items.iter().enumerate() {
        let item = validate_item(idx, raw)?;
        if !seen.insert(item.key()) {
            return Err(invalid(format!(
                "items[{idx}]: duplicate item `{}`",
                item.key()
            )));
        }
        parsed.push(item);
    }

    let context = match obj.get("context") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Some(_) => return Err(invalid("`context` must be a string")),
    };

    Ok(PriceRequest {
        items: parsed,
        context,
    })
}

fn validate_item(idx: usize, raw: &Value) -> ValidationResult<PriceRequestItem> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid(format!("items[{idx}] must be an object")))?;

    let category = match obj.get("cat") {
        Some(v) => non_blank(idx, "cat", Some(v))?,
        None => non_blank(idx, "cat", obj.get("category"))?,
    };
    let label = non_blank(idx, "label", obj.get("label"))?;
    let method_str = string_field(idx, obj, "method")?;
    let method = PricingMethod::parse(method_str).ok_or_else(|| {
        invalid(format!(
            "items[{idx}].method `{method_str}` is not one of: total, labor-material, per-sqft"
        ))
    })?;

    Ok(PriceRequestItem {
        category,
        label,
        method,
    })
}

fn string_field<'a>(
    idx: usize,
    obj: &'a Map<String, Value>,
    name: &str,
) -> ValidationResult<&'a str> {
    match obj.get(name) {
        None | Some(Value::Null) => Err(invalid(format!("items[{idx}] is missing `{name}`"))),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(invalid(format!("items[{idx}].{name} must be a string"))),
    }
}

fn non_blank(idx: usize, name: &str, value: Option<&Value>) -> ValidationResult<String> {
    match value {
        None | Some(Value::Null) => Err(invalid(format!("items[{idx}] is missing `{name}`"))),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(invalid(format!("items[{idx}].{name} must not be blank")))
        }
        // '|' would make the composite key ambiguous.
        Some(Value::String(s)) if name == "cat" && s.contains('|') => {
            Err(invalid(format!("items[{idx}].{name} must not contain `|`")))
        }
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(invalid(format!("items[{idx}].{name} must be a string"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
