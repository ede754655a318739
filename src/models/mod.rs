//! Core data model: platforms, cache keys, and retrieval snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A supported social platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Tiktok,
}

impl Platform {
    /// All platforms the reconciler fans out over.
    pub const ALL: [Platform; 2] = [Platform::Instagram, Platform::Tiktok];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
        }
    }

    /// Domain used for rate limiting and compliance checks.
    pub fn domain(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram.com",
            Platform::Tiktok => "tiktok.com",
        }
    }

    /// Canonical public profile URL for a username.
    pub fn profile_url(&self, username: &str) -> String {
        match self {
            Platform::Instagram => format!("https://www.instagram.com/{username}/"),
            Platform::Tiktok => format!("https://www.tiktok.com/@{username}"),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of data a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Profile,
    Posts,
    Engagement,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Profile => "profile",
            DataKind::Posts => "posts",
            DataKind::Engagement => "engagement",
        }
    }
}

/// Cache key: one entry per (platform, username, data kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub platform: Platform,
    pub username: String,
    pub kind: DataKind,
}

impl CacheKey {
    pub fn new(platform: Platform, username: impl Into<String>, kind: DataKind) -> Self {
        Self {
            platform,
            username: username.into(),
            kind,
        }
    }

    /// Flat key used by backing stores: `instagram_username_profile`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.platform.as_str(),
            self.username,
            self.kind.as_str()
        )
    }
}

/// Where a snapshot's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotSource {
    #[serde(rename = "live_scraping")]
    LiveScrape,
    #[serde(rename = "fallback")]
    Fallback,
}

/// One immutable retrieval attempt's result for one platform.
///
/// Produced by an extraction adapter on success, or as a fallback placeholder
/// when retrieval was blocked or failed. Never written back to storage except
/// through the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub platform: Platform,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub follower_count: u64,
    pub verified: bool,
    pub profile_url: String,
    pub retrieved_successfully: bool,
    pub retrieved_at: DateTime<Utc>,
    pub source: SnapshotSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl ProfileSnapshot {
    /// Placeholder snapshot for the degraded path. Callers treat this as a
    /// normal outcome, not an error.
    pub fn fallback(platform: Platform, username: &str, reason: impl Into<String>) -> Self {
        Self {
            platform,
            username: username.to_string(),
            display_name: None,
            follower_count: 0,
            verified: false,
            profile_url: platform.profile_url(username),
            retrieved_successfully: false,
            retrieved_at: Utc::now(),
            source: SnapshotSource::Fallback,
            error_reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_layout() {
        let key = CacheKey::new(Platform::Instagram, "samantha", DataKind::Profile);
        assert_eq!(key.storage_key(), "instagram_samantha_profile");

        let key = CacheKey::new(Platform::Tiktok, "samantha", DataKind::Engagement);
        assert_eq!(key.storage_key(), "tiktok_samantha_engagement");
    }

    #[test]
    fn test_profile_urls() {
        assert_eq!(
            Platform::Instagram.profile_url("user"),
            "https://www.instagram.com/user/"
        );
        assert_eq!(
            Platform::Tiktok.profile_url("user"),
            "https://www.tiktok.com/@user"
        );
    }

    #[test]
    fn test_fallback_snapshot_is_unsuccessful() {
        let snapshot = ProfileSnapshot::fallback(Platform::Tiktok, "user", "network down");
        assert!(!snapshot.retrieved_successfully);
        assert_eq!(snapshot.follower_count, 0);
        assert_eq!(snapshot.source, SnapshotSource::Fallback);
        assert_eq!(snapshot.error_reason.as_deref(), Some("network down"));
    }

    #[test]
    fn test_snapshot_serde_field_names() {
        let snapshot = ProfileSnapshot::fallback(Platform::Instagram, "user", "blocked");
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["platform"], "instagram");
        assert_eq!(value["followerCount"], 0);
        assert_eq!(value["retrievedSuccessfully"], false);
        assert_eq!(value["source"], "fallback");
    }
}
