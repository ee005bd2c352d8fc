// src/status.rs

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use unicode_normalization::UnicodeNormalization;

use crate::error::ParkError;
use crate::search::normalize_text;

/// Lifecycle state of a plot.
///
/// Serializes to and displays as the Vietnamese label used in the backend data.
/// Deserialization is lenient: any string is run through [`normalize_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlotStatus {
    /// Trống
    Available,
    /// Đã bán
    Sold,
    /// Đặt cọc
    Deposited,
    /// Đặt cọc ngắn hạn
    ShortTermDeposit,
    /// Đặt cọc dài hạn
    LongTermDeposit,
    /// Đã nhượng quyền sử dụng
    RightsTransferred,
    /// Đã an táng
    Buried,
    /// Khác
    #[default]
    Other,
}

impl PlotStatus {
    pub const ALL: [PlotStatus; 8] = [
        PlotStatus::Available,
        PlotStatus::Sold,
        PlotStatus::Deposited,
        PlotStatus::ShortTermDeposit,
        PlotStatus::LongTermDeposit,
        PlotStatus::RightsTransferred,
        PlotStatus::Buried,
        PlotStatus::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PlotStatus::Available => "Trống",
            PlotStatus::Sold => "Đã bán",
            PlotStatus::Deposited => "Đặt cọc",
            PlotStatus::ShortTermDeposit => "Đặt cọc ngắn hạn",
            PlotStatus::LongTermDeposit => "Đặt cọc dài hạn",
            PlotStatus::RightsTransferred => "Đã nhượng quyền sử dụng",
            PlotStatus::Buried => "Đã an táng",
            PlotStatus::Other => "Khác",
        }
    }

    /// Only empty plots can be offered to a customer.
    pub fn is_available(self) -> bool {
        self == PlotStatus::Available
    }
}

impl fmt::Display for PlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Strict parse: accepts only a canonical label (surrounding whitespace ignored).
impl FromStr for PlotStatus {
    type Err = ParkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let composed: String = s.trim().nfc().collect();
        PlotStatus::ALL
            .into_iter()
            .find(|status| status.label() == composed)
            .ok_or_else(|| ParkError::InvalidInput(format!("unknown plot status '{}'", s)))
    }
}

impl Serialize for PlotStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for PlotStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        Ok(normalize_status(s.as_deref()))
    }
}

struct StatusPatterns {
    buried: Regex,
    short_term: Regex,
    long_term: Regex,
    transferred: Regex,
}

// Patterns run against `normalize_text` output: lowercase ASCII, single spaces.
fn patterns() -> &'static StatusPatterns {
    static PATTERNS: OnceLock<StatusPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| StatusPatterns {
        buried: Regex::new(r"\ban ?tang\b").expect("valid regex"),
        short_term: Regex::new(r"\bngan ?han\b").expect("valid regex"),
        long_term: Regex::new(r"\b(?:dai ?han|(?:vo|khong) ?thoi ?han|dac ?biet)\b")
            .expect("valid regex"),
        transferred: Regex::new(r"\bnhuong ?quyen\b").expect("valid regex"),
    })
}

/// Maps free-text status from manual data entry onto [`PlotStatus`].
///
/// Variant spellings (with or without diacritics, spaces or hyphens) of the
/// burial, short-term deposit, long-term deposit and rights-transfer states are
/// recognised in that order. Otherwise the text must be exactly one of the base
/// labels `Trống`, `Đã bán`, `Đặt cọc`; anything else is [`PlotStatus::Other`].
pub fn normalize_status(raw: Option<&str>) -> PlotStatus {
    let Some(raw) = raw else {
        return PlotStatus::Other;
    };
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return PlotStatus::Other;
    }

    let folded = normalize_text(&cleaned);
    let p = patterns();
    if p.buried.is_match(&folded) {
        return PlotStatus::Buried;
    }
    if p.short_term.is_match(&folded) {
        return PlotStatus::ShortTermDeposit;
    }
    if p.long_term.is_match(&folded) {
        return PlotStatus::LongTermDeposit;
    }
    if p.transferred.is_match(&folded) {
        return PlotStatus::RightsTransferred;
    }

    let composed: String = cleaned.nfc().collect();
    [PlotStatus::Available, PlotStatus::Sold, PlotStatus::Deposited]
        .into_iter()
        .find(|status| status.label() == composed)
        .unwrap_or(PlotStatus::Other)
}
