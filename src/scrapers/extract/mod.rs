//! Heuristic extraction of profile snapshots from retrieved markup.
//!
//! Each platform adapter applies an ordered list of heuristics until one
//! yields a usable follower count: an embedded structured-data block first,
//! then a meta/description phrase match, else the snapshot is marked
//! unavailable. Adapters never panic or error past their boundary; any
//! internal parse failure just means "this heuristic did not yield a value".

use scraper::{Html, Selector};

use crate::models::{Platform, ProfileSnapshot};

mod instagram;
mod tiktok;

pub use instagram::InstagramAdapter;
pub use tiktok::TikTokAdapter;

/// Parses raw retrieved markup into a structured profile snapshot.
pub trait ExtractionAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Extract a snapshot. Total heuristic failure yields a zero-value
    /// snapshot with `retrieved_successfully = false`, never a panic.
    fn extract(&self, markup: &str, username: &str) -> ProfileSnapshot;
}

/// The adapter for a platform.
pub fn adapter_for(platform: Platform) -> Box<dyn ExtractionAdapter> {
    match platform {
        Platform::Instagram => Box::new(InstagramAdapter::new()),
        Platform::Tiktok => Box::new(TikTokAdapter::new()),
    }
}

/// Expand a numeric token with an optional K/M/B suffix.
///
/// `"1.2K"` → 1200, `"3M"` → 3000000, `"46,200"` → 46200, `"450"` → 450.
/// Rounds to the nearest integer after expansion.
pub(crate) fn parse_count(token: &str) -> Option<u64> {
    let cleaned = token.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }

    let (digits, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1e3),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1e6),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1e9),
        _ => (cleaned.as_str(), 1.0),
    };

    let value: f64 = digits.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Content of the first matching `<meta property=...>` or `<meta name=...>`.
pub(crate) fn meta_content(doc: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(
        r#"meta[property="{property}"], meta[name="{property}"]"#
    ))
    .ok()?;
    doc.select(&selector)
        .find_map(|element| element.value().attr("content"))
        .map(str::to_owned)
}

/// Text of the document's `<title>`.
pub(crate) fn page_title(doc: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title: String = doc.select(&selector).next()?.text().collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Whether the markup contains any verification indicator, case-insensitive.
pub(crate) fn contains_any(markup: &str, indicators: &[&str]) -> bool {
    let lowered = markup.to_lowercase();
    indicators.iter().any(|needle| lowered.contains(needle))
}

/// A JSON count value that may be numeric or a suffixed string.
pub(crate) fn count_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => parse_count(s),
        _ => None,
    }
}
