//! Shared types for the pricing gateway.
//!
//! The request items, the price map returned to callers, and the error
//! taxonomy every stage of the pipeline reports through. Everything here
//! is created per request and dropped once the response is written.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// How the model should express the price of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingMethod {
    /// Single all-in labor figure; material is always 0.
    Total,
    /// Separate per-unit labor and material rates.
    LaborMaterial,
    /// Per-square-foot labor and material rates.
    PerSqft,
}

impl PricingMethod {
    pub const ALL: [PricingMethod; 3] = [Self::Total, Self::LaborMaterial, Self::PerSqft];

    /// The wire spelling used in requests and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::LaborMaterial => "labor-material",
            Self::PerSqft => "per-sqft",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for PricingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line item to price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRequestItem {
    /// Trade or grouping, e.g. "Paint".
    #[serde(rename = "cat", alias = "category")]
    pub category: String,
    pub label: String,
    pub method: PricingMethod,
}

impl PriceRequestItem {
    pub fn new(category: impl Into<String>, label: impl Into<String>, method: PricingMethod) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
            method,
        }
    }

    /// Composite `"{category}|{label}"` key used in the price map.
    pub fn key(&self) -> String {
        format!("{}|{}", self.category, self.label)
    }
}

/// A validated, non-empty list of items plus optional project context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRequest {
    pub items: Vec<PriceRequestItem>,
    /// Free-text notes about the project (location, scope). Never empty.
    pub context: Option<String>,
}

impl PriceRequest {
    /// Look up a requested item by its composite key.
    pub fn item(&self, key: &str) -> Option<&PriceRequestItem> {
        self.items.iter().find(|i| i.key() == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.iter().map(PriceRequestItem::key).collect()
    }
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Labor and material price for one item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub labor: f64,
    pub material: f64,
}

impl PriceEntry {
    pub fn new(labor: f64, material: f64) -> Self {
        Self { labor, material }
    }

    /// Both values finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.labor, self.material]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Composite key → price, kept in insertion order.
///
/// Serializes as a plain JSON object. Inserting an existing key replaces
/// the entry in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMap {
    entries: Vec<(String, PriceEntry)>,
}

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: PriceEntry) -> Option<PriceEntry> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, entry)),
            None => {
                self.entries.push((key, entry));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&PriceEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PriceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for PriceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PriceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriceMapVisitor;

        impl<'de> Visitor<'de> for PriceMapVisitor {
            type Value = PriceMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of {labor, material} entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PriceMap, A::Error> {
                let mut prices = PriceMap::new();
                while let Some((key, entry)) = access.next_entry::<String, PriceEntry>()? {
                    prices.insert(key, entry);
                }
                Ok(prices)
            }
        }

        deserializer.deserialize_map(PriceMapVisitor)
    }
}

/// Output of the recovery pipeline.
///
/// `missing` holds requested keys the model did not price; `dropped`
/// holds response keys that were discarded. Either being non-empty means
/// the result is partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub prices: PriceMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
}

impl PriceEstimate {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Every way a pricing request can fail.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("Upstream unreachable: {message}")]
    UpstreamUnreachable { timed_out: bool, message: String },

    #[error("Upstream rejected request (HTTP {status}): {detail}")]
    UpstreamRejected { status: u16, detail: String },

    #[error("Upstream returned no usable completion: {reason}")]
    EmptyCompletion { reason: String, raw: String },

    #[error("No price map could be recovered from {} bytes of completion text", .raw.len())]
    RecoveryExhausted { raw: String },
}

impl GatewayError {
    /// Short stable name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::EmptyCompletion { .. } => "empty_completion",
            Self::RecoveryExhausted { .. } => "recovery_exhausted",
        }
    }

    /// Message safe to return to callers. Upstream payloads and raw
    /// completion text stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::MethodNotAllowed(_) => "Method Not Allowed. Use POST.".to_string(),
            Self::UpstreamUnreachable { timed_out: true, .. } => {
                "Pricing service timed out".to_string()
            }
            Self::UpstreamUnreachable { timed_out: false, .. } => {
                "Pricing service unreachable".to_string()
            }
            Self::UpstreamRejected { status, .. } => {
                format!("Pricing service rejected the request (HTTP {status})")
            }
            Self::EmptyCompletion { .. } => "Pricing service returned an empty response".to_string(),
            Self::RecoveryExhausted { .. } => {
                "Pricing service response could not be parsed".to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
