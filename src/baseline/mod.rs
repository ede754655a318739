//! The trusted baseline record and its provenance metadata.
//!
//! The baseline is the manually curated per-creator record that live scraping
//! selectively overwrites. It is loaded from a JSON document, mutated only by
//! the reconciler, and read by the presentation layer. A missing or corrupt
//! baseline is a hard initialization failure: there is no fallback beneath it.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BaselineError;
use crate::models::Platform;

/// Where a platform's current values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "live")]
    Live,
    #[serde(rename = "hybrid-override")]
    HybridOverride,
}

/// Data-quality classification, per platform and aggregate.
///
/// Per-platform values are only ever `Manual` or `Live`; `Hybrid` appears
/// in the aggregate when platforms disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Manual,
    Live,
    Hybrid,
}

/// Creator identity section of the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProfile {
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<String>,
}

/// One point of a follower history series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub month: String,
    pub followers: u64,
}

/// A top-performing post or video, as manually curated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub views: u64,
}

/// Per-platform section of the baseline record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub handle: String,
    pub followers: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_likes: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monthly_growth: Vec<GrowthPoint>,
    #[serde(default, alias = "topVideos", skip_serializing_if = "Vec::is_empty")]
    pub top_posts: Vec<ContentItem>,
    /// Timestamp of the last retrieval attempt, successful or not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scraped: Option<DateTime<Utc>>,
    /// Whether the last retrieval attempt succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_successfully: Option<bool>,
}

/// Per-platform data-quality tags plus the computed aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMap {
    pub instagram: DataQuality,
    pub tiktok: DataQuality,
    pub overall: DataQuality,
}

impl Default for QualityMap {
    fn default() -> Self {
        Self {
            instagram: DataQuality::Manual,
            tiktok: DataQuality::Manual,
            overall: DataQuality::Manual,
        }
    }
}

impl QualityMap {
    pub fn get(&self, platform: Platform) -> DataQuality {
        match platform {
            Platform::Instagram => self.instagram,
            Platform::Tiktok => self.tiktok,
        }
    }

    pub fn set(&mut self, platform: Platform, quality: DataQuality) {
        match platform {
            Platform::Instagram => self.instagram = quality,
            Platform::Tiktok => self.tiktok = quality,
        }
        self.recompute_overall();
    }

    /// Aggregate rule: `live` iff every platform is live, `hybrid` iff at
    /// least one is, otherwise `manual`.
    pub fn recompute_overall(&mut self) {
        let per_platform = [self.instagram, self.tiktok];
        self.overall = if per_platform.iter().all(|q| *q == DataQuality::Live) {
            DataQuality::Live
        } else if per_platform.iter().any(|q| *q == DataQuality::Live) {
            DataQuality::Hybrid
        } else {
            DataQuality::Manual
        };
    }
}

/// Per-platform provenance labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMap {
    pub instagram: Provenance,
    pub tiktok: Provenance,
}

impl Default for SourceMap {
    fn default() -> Self {
        Self {
            instagram: Provenance::Manual,
            tiktok: Provenance::Manual,
        }
    }
}

impl SourceMap {
    pub fn get(&self, platform: Platform) -> Provenance {
        match platform {
            Platform::Instagram => self.instagram,
            Platform::Tiktok => self.tiktok,
        }
    }

    pub fn set(&mut self, platform: Platform, provenance: Provenance) {
        match platform {
            Platform::Instagram => self.instagram = provenance,
            Platform::Tiktok => self.tiktok = provenance,
        }
    }
}

/// Record metadata: freshness, quality, and provenance tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub data_quality: QualityMap,
    #[serde(default)]
    pub sources: SourceMap,
    #[serde(default = "default_auto_update")]
    pub auto_update_enabled: bool,
}

fn default_auto_update() -> bool {
    true
}

impl Default for RecordMetadata {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            data_quality: QualityMap::default(),
            sources: SourceMap::default(),
            auto_update_enabled: true,
        }
    }
}

/// The trusted, mutable per-creator record.
///
/// The reconciler is the only writer. Serialized form is the camelCase JSON
/// interchange document consumed by the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineRecord {
    pub profile: CreatorProfile,
    pub instagram: PlatformStats,
    pub tiktok: PlatformStats,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl BaselineRecord {
    /// Load the baseline from a JSON document.
    ///
    /// A manually curated file may omit `metadata`; it is bootstrapped to
    /// all-manual provenance. Missing or unparseable input is a hard error.
    pub fn load(path: &Path) -> Result<Self, BaselineError> {
        let contents = std::fs::read_to_string(path).map_err(|source| BaselineError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let record: BaselineRecord = serde_json::from_str(&contents)?;
        Ok(record)
    }

    pub fn platform(&self, platform: Platform) -> &PlatformStats {
        match platform {
            Platform::Instagram => &self.instagram,
            Platform::Tiktok => &self.tiktok,
        }
    }

    pub fn platform_mut(&mut self, platform: Platform) -> &mut PlatformStats {
        match platform {
            Platform::Instagram => &mut self.instagram,
            Platform::Tiktok => &mut self.tiktok,
        }
    }

    /// The interchange JSON document.
    pub fn export(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BaselineRecord {
        serde_json::from_str(
            r#"{
                "profile": { "name": "Samantha", "username": "samanthacrianza" },
                "instagram": { "handle": "samanthacrianza", "followers": 46200, "engagementRate": 7.8 },
                "tiktok": { "handle": "samanthacrianza", "followers": 78400, "averageViews": 45200 }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_metadata_defaults_to_manual() {
        let record = record();
        assert_eq!(record.metadata.data_quality.overall, DataQuality::Manual);
        assert_eq!(
            record.metadata.sources.get(Platform::Instagram),
            Provenance::Manual
        );
        assert!(record.metadata.auto_update_enabled);
    }

    #[test]
    fn test_aggregate_quality_rule() {
        let mut quality = QualityMap::default();
        assert_eq!(quality.overall, DataQuality::Manual);

        quality.set(Platform::Instagram, DataQuality::Live);
        assert_eq!(quality.overall, DataQuality::Hybrid);

        quality.set(Platform::Tiktok, DataQuality::Live);
        assert_eq!(quality.overall, DataQuality::Live);

        quality.set(Platform::Instagram, DataQuality::Manual);
        assert_eq!(quality.overall, DataQuality::Hybrid);

        quality.set(Platform::Tiktok, DataQuality::Manual);
        assert_eq!(quality.overall, DataQuality::Manual);
    }

    #[test]
    fn test_export_uses_interchange_field_names() {
        let record = record();
        let value = record.export();
        assert_eq!(value["instagram"]["followers"], 46200);
        assert_eq!(value["instagram"]["engagementRate"], 7.8);
        assert_eq!(value["metadata"]["dataQuality"]["overall"], "manual");
        assert!(value["metadata"]["lastUpdated"].is_string());
    }

    #[test]
    fn test_load_missing_file_is_hard_error() {
        let err = BaselineRecord::load(Path::new("/nonexistent/manual-data.json")).unwrap_err();
        assert!(matches!(err, BaselineError::NotFound { .. }));
    }

    #[test]
    fn test_load_malformed_file_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual-data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = BaselineRecord::load(&path).unwrap_err();
        assert!(matches!(err, BaselineError::Malformed(_)));
    }
}
