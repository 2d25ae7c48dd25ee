//! Prompt construction for price estimation.
//!
//! The system instruction is fixed text: domain framing, the output
//! contract, and what each pricing method means. The user instruction
//! lists the items. Nothing here reads the clock or any per-request
//! identity, so equal requests always render byte-identical prompts.

use std::fmt::Write;

use crate::types::PriceRequest;

/// The two messages sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the system instruction.
pub fn system_prompt() -> &'static str {
    "You are a professional Utah real estate rehab cost estimator and the \
     regional authority on residential renovation pricing. Price every item \
     using current typical contractor rates for the Utah market.\n\n\
     OUTPUT CONTRACT:\n\
     1. Return ONLY a single valid JSON object. No text before or after it.\n\
     2. Do not wrap the JSON in markdown or code fences.\n\
     3. Each key is exactly \"{category}|{label}\" as given in the item list.\n\
     4. Each value is an object: {\"labor\": number, \"material\": number}.\n\
     5. Values are plain numbers in US dollars: no currency symbols, no \
        units, no ranges, no commentary.\n\
     6. Include one key for every listed item and no other keys.\n\n\
     PRICING METHODS (shown in brackets after each item):\n\
     - [total]: a single all-in labor figure for the whole job; material MUST be 0.\n\
     - [labor-material]: separate per-unit labor rate and per-unit material rate.\n\
     - [per-sqft]: labor rate and material rate per square foot."
}

/// Build the user instruction listing each item in request order.
pub fn build_user_prompt(request: &PriceRequest) -> String {
    let mut prompt = String::with_capacity(64 + request.items.len() * 48);

    let _ = writeln!(
        prompt,
        "Estimate labor and material prices for these {} items:",
        request.items.len()
    );
    for item in &request.items {
        let _ = writeln!(prompt, "{} [{}]", item.key(), item.method);
    }

    if let Some(context) = &request.context {
        let _ = write!(prompt, "\nProject context: {context}\n");
    }

    prompt
}

/// Render both messages for a validated request.
pub fn build(request: &PriceRequest) -> Prompt {
    Prompt {
        system: system_prompt().to_string(),
        user: build_user_prompt(request),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
