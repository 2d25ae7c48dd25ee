//! Recovery of a price map from free-form completion text.
//!
//! Models wrap JSON in code fences or surround it with commentary even
//! when told not to. Parsing is attempted in stages, each more lenient
//! than the last:
//!
//! 1. strip code fences, trim, parse the remainder as a JSON object;
//! 2. parse the span from the first `{` to the last `}`;
//! 3. validate each entry's shape, dropping bad entries individually.
//!
//! Only when no stage yields a JSON object does the whole response fail.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{GatewayError, PriceEntry, PriceEstimate, PriceMap, PriceRequest, PricingMethod};

/// Wrapper key models most often put around the map.
const PRICES_KEY: &str = "prices";

/// Run the full pipeline over `raw` for the items in `request`.
pub fn recover(raw: &str, request: &PriceRequest) -> Result<PriceEstimate, GatewayError> {
    let doc = parse_document(raw).ok_or_else(|| GatewayError::RecoveryExhausted {
        raw: raw.to_string(),
    })?;

    let entries = locate_entries(&doc, request);
    let estimate = validate_entries(entries, request);

    if !estimate.missing.is_empty() {
        warn!(
            missing = ?estimate.missing,
            priced = estimate.prices.len(),
            requested = request.items.len(),
            "Completion priced fewer items than requested"
        );
    }

    Ok(estimate)
}

/// Stages 1 and 2: find a JSON object in the text.
pub fn parse_document(raw: &str) -> Option<Map<String, Value>> {
    let stripped = strip_code_fence(raw);
    if let Some(obj) = parse_object(stripped) {
        return Some(obj);
    }
    debug!("Direct parse failed, trying brace extraction");

    let span = extract_braced(raw)?;
    let obj = parse_object(span);
    if obj.is_none() {
        debug!(span_len = span.len(), "Brace extraction did not yield a JSON object");
    }
    obj
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the language tag: the rest of the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Greedy span from the first `{` to the last `}`.
pub fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Pick the object that holds the entries.
///
/// Accepts the bare map, a `{"prices": {...}}` wrapper, or any other
/// single-key wrapper whose value is not itself an entry.
fn locate_entries<'a>(doc: &'a Map<String, Value>, request: &PriceRequest) -> &'a Map<String, Value> {
    if let Some(Value::Object(inner)) = doc.get(PRICES_KEY) {
        return inner;
    }

    if doc.len() == 1 {
        if let Some((key, Value::Object(inner))) = doc.iter().next() {
            if request.item(key.trim()).is_none() && !looks_like_entry(inner) {
                debug!(wrapper = %key, "Unwrapping single-key wrapper object");
                return inner;
            }
        }
    }

    doc
}

fn looks_like_entry(obj: &Map<String, Value>) -> bool {
    obj.contains_key("labor") || obj.contains_key("material")
}

/// Stage 3: keep requested keys whose values have the documented shape.
fn validate_entries(entries: &Map<String, Value>, request: &PriceRequest) -> PriceEstimate {
    let mut estimate = PriceEstimate::default();

    for key in entries.keys() {
        if request.item(key.trim()).is_none() {
            warn!(key = %key, "Dropping price for an item that was not requested");
            estimate.dropped.push(key.clone());
        }
    }

    let mut prices = PriceMap::new();
    let mut used: Vec<&str> = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let key = item.key();
        let found = entries
            .iter()
            .find(|(k, _)| **k == key)
            .or_else(|| entries.iter().find(|(k, _)| k.trim() == key));

        let Some((found_key, value)) = found else {
            estimate.missing.push(key);
            continue;
        };
        used.push(found_key);

        match parse_entry(value) {
            Ok(mut entry) => {
                if item.method == PricingMethod::Total && entry.material != 0.0 {
                    debug!(key = %key, material = entry.material, "Forcing material to 0 for total-priced item");
                    entry.material = 0.0;
                }
                prices.insert(key, entry);
            }
            Err(reason) => {
                warn!(key = %key, reason, "Dropping malformed price entry");
                estimate.dropped.push(key.clone());
                estimate.missing.push(key);
            }
        }
    }

    // A requested key can appear twice, once padded with whitespace.
    for key in entries.keys() {
        if request.item(key.trim()).is_some() && !used.contains(&key.as_str()) {
            warn!(key = %key, "Dropping duplicate price for an already-priced item");
            estimate.dropped.push(key.clone());
        }
    }

    estimate.prices = prices;
    estimate
}

fn parse_entry(value: &Value) -> Result<PriceEntry, &'static str> {
    let obj = value.as_object().ok_or("entry is not an object")?;
    let labor = obj
        .get("labor")
        .and_then(Value::as_f64)
        .ok_or("labor is missing or not a number")?;
    let material = obj
        .get("material")
        .and_then(Value::as_f64)
        .ok_or("material is missing or not a number")?;

    let entry = PriceEntry::new(labor, material);
    if !entry.is_valid() {
        return Err("price is negative or not finite");
    }
    Ok(entry)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
