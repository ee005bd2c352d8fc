// src/search.rs

use unicode_normalization::UnicodeNormalization;

use crate::plot::Plot;
use crate::status::PlotStatus;

/// Produces the accent-insensitive form of `input` used for substring search.
///
/// Lowercases, decomposes (NFD) and drops the combining marks U+0300..=U+036F,
/// maps `đ` to `d`, turns every other non-alphanumeric character into a space
/// and collapses whitespace. `None` yields an empty string.
///
/// ```
/// use memorial_park::search::vn_normalize;
///
/// assert_eq!(vn_normalize(Some("Đã Bán")), "da ban");
/// assert_eq!(vn_normalize(None), "");
/// ```
pub fn vn_normalize(input: Option<&str>) -> String {
    match input {
        Some(text) => normalize_text(text),
        None => String::new(),
    }
}

/// Same as [`vn_normalize`] for a present value.
pub fn normalize_text(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' => 'd',
            c if c.is_ascii_alphanumeric() || c.is_whitespace() => c,
            _ => ' ',
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Returns true when the normalized `query` occurs in the normalized `haystack`.
/// An empty query matches everything.
pub fn matches_search(haystack: &str, query: &str) -> bool {
    let needle = normalize_text(query);
    needle.is_empty() || normalize_text(haystack).contains(&needle)
}

/// Search box and status dropdown of the plot list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotFilter {
    pub text: String,
    pub status: Option<PlotStatus>,
}

impl PlotFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn status(mut self, status: PlotStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && normalize_text(&self.text).is_empty()
    }

    /// Checks a single plot against both the text query and the status filter.
    pub fn matches(&self, plot: &Plot) -> bool {
        if let Some(wanted) = self.status {
            if plot.status() != wanted {
                return false;
            }
        }

        let needle = normalize_text(&self.text);
        if needle.is_empty() {
            return true;
        }

        [
            Some(plot.id.as_str()),
            plot.name.as_deref(),
            plot.zone.as_deref(),
            plot.customer_name.as_deref(),
            plot.notes.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| normalize_text(field).contains(&needle))
    }
}

/// Returns the plots passing `filter`, in their original order.
pub fn filter_plots<'a>(plots: &'a [Plot], filter: &PlotFilter) -> Vec<&'a Plot> {
    plots.iter().filter(|plot| filter.matches(plot)).collect()
}
