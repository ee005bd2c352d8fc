// src/geo.rs

use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParkError;

/// Base used by [`Coordinate::directions_url`] when nothing else is configured.
pub const DEFAULT_DIRECTIONS_BASE: &str = "https://www.google.com/maps";

/// A validated geographical position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = ParkError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    /// Creates a new `Coordinate`.
    ///
    /// Returns `ParkError::InvalidInput` if either value is not finite, latitude is
    /// outside -90..=90 or longitude is outside -180..=180.
    pub fn new(lat: f64, lng: f64) -> Result<Self, ParkError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ParkError::InvalidInput(format!(
                "latitude {} must be between -90 and 90 degrees",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ParkError::InvalidInput(format!(
                "longitude {} must be between -180 and 180 degrees",
                lng
            )));
        }
        Ok(Coordinate { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Builds a directions deep link to this position, e.g.
    /// `https://www.google.com/maps/dir/?destination=10.762622,106.660172`.
    pub fn directions_url(&self, base: &str) -> String {
        format!("{}/dir/?destination={}", base.trim_end_matches('/'), self)
    }
}

/// Six decimals, `lat,lng`.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

// Signed decimal; "+10.5", ".5" and "10." are accepted.
const NUM: &str = r"([-+]?(?:\d+(?:\.\d*)?|\.\d+))";

struct CoordinatePatterns {
    direct: Regex,
    at_fragment: Regex,
    query_param: Regex,
    data_path: Regex,
    data_path_reversed: Regex,
    number: Regex,
}

fn patterns() -> &'static CoordinatePatterns {
    static PATTERNS: OnceLock<CoordinatePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CoordinatePatterns {
        direct: Regex::new(&format!(r"^\s*{NUM}\s*(?:,\s*|\s+){NUM}\s*$")).expect("valid regex"),
        at_fragment: Regex::new(&format!(r"@{NUM}\s*,\s*{NUM}")).expect("valid regex"),
        query_param: Regex::new(&format!(r"[?&](?:q|query)=[\s+]*{NUM}[\s+]*,[\s+]*{NUM}"))
            .expect("valid regex"),
        data_path: Regex::new(&format!(r"!3d{NUM}!4d{NUM}")).expect("valid regex"),
        data_path_reversed: Regex::new(&format!(r"!4d{NUM}!3d{NUM}")).expect("valid regex"),
        number: Regex::new(NUM).expect("valid regex"),
    })
}

/// Extracts a coordinate from a raw pair, a Google Maps link or noisy text.
///
/// Pattern families are tried in a fixed order and the first that yields a
/// valid coordinate wins:
///
/// 1. the whole input is a `lat,lng` (or `lat lng`) pair
/// 2. an `@lat,lng` URL fragment
/// 3. a `q=` / `query=` parameter holding `lat,lng`
/// 4. an encoded `!3d<lat>!4d<lng>` path
/// 5. the reversed `!4d<lng>!3d<lat>` path
/// 6. the first two numbers found anywhere
///
/// For 1 and 6 the axis order is guessed: when the first number cannot be a
/// latitude (|x| > 90) but the second fits a longitude, the two are swapped.
/// Pairs where both values are valid latitudes keep their input order, so a
/// `lng,lat` pair in that range is silently misread.
///
/// Returns `None` for missing or empty input and when nothing matches.
pub fn parse_coordinate(input: Option<&str>) -> Option<Coordinate> {
    let raw = input?;
    if raw.trim().is_empty() {
        return None;
    }

    let decoded: Cow<'_, str> = percent_decode_str(raw)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(raw));
    let text = normalize_separators(&decoded);
    let p = patterns();

    if let Some(c) = capture_pair(&p.direct, &text).and_then(|(a, b)| disambiguate(a, b)) {
        return Some(c);
    }

    // flag: captures come lng-first
    let url_families = [
        (&p.at_fragment, false),
        (&p.query_param, false),
        (&p.data_path, false),
        (&p.data_path_reversed, true),
    ];
    for (re, reversed) in url_families {
        let found = capture_pair(re, &text).and_then(|(a, b)| {
            let (lat, lng) = if reversed { (b, a) } else { (a, b) };
            Coordinate::new(lat, lng).ok()
        });
        if found.is_some() {
            return found;
        }
    }

    let mut numbers = p
        .number
        .find_iter(&text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite());
    let first = numbers.next()?;
    let second = numbers.next()?;
    disambiguate(first, second)
}

fn normalize_separators(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{FF0C}' => ',',
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\u{3000}' => ' ',
            c => c,
        })
        .collect()
}

fn capture_pair(re: &Regex, text: &str) -> Option<(f64, f64)> {
    let caps = re.captures(text)?;
    let a = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let b = caps.get(2)?.as_str().parse::<f64>().ok()?;
    (a.is_finite() && b.is_finite()).then_some((a, b))
}

fn disambiguate(first: f64, second: f64) -> Option<Coordinate> {
    if first.abs() > 90.0 && second.abs() <= 180.0 {
        Coordinate::new(second, first).ok()
    } else {
        Coordinate::new(first, second).ok()
    }
}
