//! Instagram profile extraction.

use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};

use super::{contains_any, count_value, meta_content, page_title, ExtractionAdapter};
use crate::models::{Platform, ProfileSnapshot, SnapshotSource};

const VERIFIED_INDICATORS: &[&str] = &["verified", "blue-tick", "official"];

pub struct InstagramAdapter {
    json_ld: Selector,
    followers_re: Regex,
}

impl InstagramAdapter {
    pub fn new() -> Self {
        Self {
            json_ld: Selector::parse(r#"script[type="application/ld+json"]"#)
                .expect("static selector"),
            followers_re: Regex::new(r"(?i)([\d][\d.,]*\s*[KMB]?)\s*Followers")
                .expect("static pattern"),
        }
    }

    /// Heuristic (a): follower count from an embedded JSON-LD block.
    fn followers_from_json_ld(&self, doc: &Html) -> Option<u64> {
        for script in doc.select(&self.json_ld) {
            let raw = script.inner_html();
            let Ok(data) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
                continue;
            };
            if let Some(count) = follow_interaction_count(&data).filter(|n| *n > 0) {
                return Some(count);
            }
        }
        None
    }

    /// Heuristic (b): "<count> Followers" in the og:description meta field.
    fn followers_from_meta(&self, doc: &Html) -> Option<u64> {
        let description = meta_content(doc, "og:description")?;
        let captured = self.followers_re.captures(&description)?;
        super::parse_count(captured.get(1)?.as_str()).filter(|n| *n > 0)
    }

    /// Display name from the page title, with Instagram's suffix stripped.
    fn display_name(&self, doc: &Html, username: &str) -> Option<String> {
        let title = page_title(doc)?;
        let name = title
            .split(" (@")
            .next()
            .unwrap_or(&title)
            .trim()
            .to_string();
        (!name.is_empty() && name != username).then_some(name)
    }
}

impl Default for InstagramAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn extract(&self, markup: &str, username: &str) -> ProfileSnapshot {
        let doc = Html::parse_document(markup);

        let followers = self
            .followers_from_json_ld(&doc)
            .or_else(|| self.followers_from_meta(&doc));

        match followers {
            Some(count) => ProfileSnapshot {
                platform: Platform::Instagram,
                username: username.to_string(),
                display_name: self.display_name(&doc, username),
                follower_count: count,
                verified: contains_any(markup, VERIFIED_INDICATORS),
                profile_url: Platform::Instagram.profile_url(username),
                retrieved_successfully: true,
                retrieved_at: Utc::now(),
                source: SnapshotSource::LiveScrape,
                error_reason: None,
            },
            None => ProfileSnapshot::fallback(
                Platform::Instagram,
                username,
                "no heuristic yielded a follower count",
            ),
        }
    }
}

/// Walk a JSON-LD document looking for an `interactionStatistic` whose
/// interaction type is a follow action.
fn follow_interaction_count(data: &serde_json::Value) -> Option<u64> {
    match data {
        serde_json::Value::Array(items) => items.iter().find_map(follow_interaction_count),
        serde_json::Value::Object(map) => {
            if let Some(stats) = map.get("interactionStatistic") {
                if let Some(count) = interaction_follows(stats) {
                    return Some(count);
                }
            }
            map.get("mainEntity")
                .or_else(|| map.get("mainEntityOfPage"))
                .and_then(follow_interaction_count)
        }
        _ => None,
    }
}

fn interaction_follows(stats: &serde_json::Value) -> Option<u64> {
    let from_item = |item: &serde_json::Value| -> Option<u64> {
        let interaction_type = item.get("interactionType")?;
        let type_name = match interaction_type {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map.get("@type")?.as_str()?.to_string(),
            _ => return None,
        };
        if !type_name.contains("Follow") {
            return None;
        }
        count_value(item.get("userInteractionCount")?)
    };

    match stats {
        serde_json::Value::Array(items) => items.iter().find_map(from_item),
        other => from_item(other),
    }
}
