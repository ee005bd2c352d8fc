// src/plot.rs

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::geo::{parse_coordinate, Coordinate};
use crate::status::{normalize_status, PlotStatus};

// Ids come back as numbers from integer primary keys and as strings otherwise.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

// Prices are typed in by staff: numbers, numeric strings, or "150.000.000 đ".
pub fn deserialize_lenient_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let price = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_price_text(&s),
        _ => None,
    };
    Ok(price.filter(|p| p.is_finite()))
}

fn grouped_thousands() -> &'static Regex {
    static GROUPED: OnceLock<Regex> = OnceLock::new();
    GROUPED.get_or_init(|| Regex::new(r"^\d{1,3}(?:[.,]\d{3})+$").expect("valid regex"))
}

// "150.000" is a hundred and fifty thousand dong, never 150.0.
fn parse_price_text(text: &str) -> Option<f64> {
    let mut amount = text.trim().to_lowercase();
    for unit in ["vnđ", "vnd", "đ", "₫"] {
        amount = amount.replace(unit, "");
    }
    let amount = amount.trim();
    if amount.is_empty() {
        return None;
    }

    let digits_only = || {
        amount
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse::<f64>()
            .ok()
    };
    if grouped_thousands().is_match(amount) {
        return digits_only();
    }
    amount.parse::<f64>().ok().or_else(digits_only)
}

/// A single burial or niche location record as stored by the backend.
///
/// `status` and `location` are kept exactly as entered; use [`Plot::status`] and
/// [`Plot::coordinate`] for the interpreted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "status")]
    pub raw_status: Option<String>,
    #[serde(default, alias = "coordinates")]
    pub location: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_price")]
    pub price: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    // Columns this crate does not model.
    #[serde(flatten)]
    pub other_fields: HashMap<String, Value>,
}

impl Plot {
    pub fn new(id: impl Into<String>) -> Self {
        Plot {
            id: id.into(),
            name: None,
            raw_status: None,
            location: None,
            zone: None,
            price: None,
            notes: None,
            customer_name: None,
            created_at: None,
            updated_at: None,
            other_fields: HashMap::new(),
        }
    }

    pub fn status(&self) -> PlotStatus {
        normalize_status(self.raw_status.as_deref())
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        parse_coordinate(self.location.as_deref())
    }

    /// Directions link for the plot, or `None` when its location does not parse.
    pub fn directions_url(&self, base: &str) -> Option<String> {
        self.coordinate().map(|c| c.directions_url(base))
    }

    /// Name shown in lists; falls back to the id for unnamed plots.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}
