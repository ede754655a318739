//! Pure derived-metric computations over the baseline record.
//!
//! Every function here is stateless and total: malformed or missing input
//! yields a zero/default output, never an error. The presentation layer
//! consumes [`DerivedMetrics`] wholesale; individual functions are exposed
//! for callers that want a single figure.

use serde::Serialize;

use crate::baseline::{BaselineRecord, PlatformStats};

/// Engagement rate assumed for TikTok accounts with no likes data.
const DEFAULT_TIKTOK_ENGAGEMENT: f64 = 3.5;
/// Conservative posts-per-month estimate used for reach.
const AVG_POSTS_PER_MONTH: f64 = 12.0;
/// Each engaged user potentially reaches this many others.
const REACH_MULTIPLIER: f64 = 8.0;
/// Typical Instagram view-to-like ratio.
const VIEW_TO_LIKE_RATIO: u64 = 15;

/// Audience-size tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InfluencerTier {
    Nano,
    Micro,
    Mid,
    Macro,
    Mega,
}

impl InfluencerTier {
    /// Tier for a total follower count.
    pub fn for_followers(followers: u64) -> Self {
        match followers {
            0..=9_999 => InfluencerTier::Nano,
            10_000..=99_999 => InfluencerTier::Micro,
            100_000..=499_999 => InfluencerTier::Mid,
            500_000..=999_999 => InfluencerTier::Macro,
            _ => InfluencerTier::Mega,
        }
    }

    /// Sector-average engagement rate for the tier.
    pub fn engagement_benchmark(&self) -> f64 {
        match self {
            InfluencerTier::Nano => 7.2,
            InfluencerTier::Micro => 4.7,
            InfluencerTier::Mid => 2.4,
            InfluencerTier::Macro => 1.7,
            InfluencerTier::Mega => 1.1,
        }
    }

    /// Base sponsorship rate per 1000 followers, in EUR.
    fn base_rate(&self) -> f64 {
        match self {
            InfluencerTier::Nano => 22.0,
            InfluencerTier::Micro => 18.0,
            InfluencerTier::Mid => 15.0,
            InfluencerTier::Macro => 12.0,
            InfluencerTier::Mega => 8.0,
        }
    }
}

/// Growth direction over the follower history series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Growing,
    Stable,
    Declining,
}

/// Month-over-month growth summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthSummary {
    pub monthly_growth_rate: f64,
    pub instagram: f64,
    pub tiktok: f64,
    pub trend: Trend,
}

/// Engagement measured against the tier benchmark.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementQuality {
    pub quality: &'static str,
    pub score: u32,
    pub ratio: f64,
    pub benchmark: f64,
}

/// Estimated per-post sponsorship earnings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsRange {
    pub min: u64,
    pub max: u64,
    pub currency: &'static str,
}

/// Follower share per platform, in whole percent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSplit {
    pub instagram_pct: u32,
    pub tiktok_pct: u32,
}

/// The full derived-metrics view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub total_followers: u64,
    pub weighted_engagement: f64,
    pub monthly_reach: u64,
    pub average_views: u64,
    pub influencer_score: u32,
    pub tier: InfluencerTier,
    pub growth: GrowthSummary,
    pub engagement_quality: EngagementQuality,
    pub estimated_earnings: EarningsRange,
    pub platform_split: PlatformSplit,
}

impl DerivedMetrics {
    pub fn derive(record: &BaselineRecord) -> Self {
        Self {
            total_followers: total_followers(record),
            weighted_engagement: weighted_engagement(record),
            monthly_reach: monthly_reach(record),
            average_views: average_views(record),
            influencer_score: influencer_score(record),
            tier: InfluencerTier::for_followers(total_followers(record)),
            growth: growth_summary(record),
            engagement_quality: engagement_quality(record),
            estimated_earnings: estimate_earnings(record),
            platform_split: platform_split(record),
        }
    }
}

/// Combined follower count across platforms.
pub fn total_followers(record: &BaselineRecord) -> u64 {
    record.instagram.followers + record.tiktok.followers
}

/// TikTok engagement from likes-to-followers, else the sector default.
fn tiktok_engagement(stats: &PlatformStats) -> f64 {
    match (stats.average_likes, stats.followers) {
        (Some(likes), followers) if followers > 0 => likes as f64 / followers as f64 * 100.0,
        _ => DEFAULT_TIKTOK_ENGAGEMENT,
    }
}

/// Follower-weighted engagement rate across platforms, in percent.
pub fn weighted_engagement(record: &BaselineRecord) -> f64 {
    let total = total_followers(record);
    if total == 0 {
        return 0.0;
    }

    let instagram_weight = record.instagram.followers as f64 / total as f64;
    let tiktok_weight = record.tiktok.followers as f64 / total as f64;

    let instagram_rate = record.instagram.engagement_rate.unwrap_or(0.0);
    let tiktok_rate = tiktok_engagement(&record.tiktok);

    round2(instagram_rate * instagram_weight + tiktok_rate * tiktok_weight)
}

/// Estimated unique monthly reach.
pub fn monthly_reach(record: &BaselineRecord) -> u64 {
    let followers = total_followers(record) as f64;
    let engagement = weighted_engagement(record) / 100.0;
    (followers * engagement * AVG_POSTS_PER_MONTH * REACH_MULTIPLIER).round() as u64
}

/// Mean per-content views across platforms that report view data.
pub fn average_views(record: &BaselineRecord) -> u64 {
    let mut total = 0u64;
    let mut platforms = 0u64;

    if let Some(likes) = record.instagram.average_likes {
        total += likes * VIEW_TO_LIKE_RATIO;
        platforms += 1;
    }
    if let Some(views) = record.tiktok.average_views {
        total += views;
        platforms += 1;
    }

    if platforms == 0 {
        0
    } else {
        total / platforms
    }
}

fn niche_multiplier(niche: Option<&str>) -> f64 {
    match niche {
        Some("crianza-educacion-infantil") => 1.2,
        Some("beauty") => 1.3,
        Some("fashion") => 1.2,
        Some("fitness") | Some("travel") => 1.1,
        Some("lifestyle") => 0.9,
        _ => 1.0,
    }
}

/// Profile-completeness component of the influencer score, capped at 25.
fn consistency_score(record: &BaselineRecord) -> f64 {
    let mut score: f64 = 0.0;
    if record.profile.bio.is_some() {
        score += 5.0;
    }
    if record.instagram.top_posts.len() >= 3 {
        score += 8.0;
    }
    if record.tiktok.top_posts.len() >= 3 {
        score += 8.0;
    }
    score.min(25.0)
}

/// Composite 0-100 influencer score: log-scaled audience, engagement, and
/// profile completeness, adjusted by niche.
pub fn influencer_score(record: &BaselineRecord) -> u32 {
    let followers = total_followers(record).max(1) as f64;
    let follower_score = followers.log10() * 20.0;
    let engagement_score = weighted_engagement(record) * 10.0;
    let multiplier = niche_multiplier(record.profile.niche.as_deref());

    let score = (follower_score + engagement_score + consistency_score(record)) * multiplier;
    (score.round() as u32).min(100)
}

/// Percent growth between the last two points of a history series.
fn series_growth(stats: &PlatformStats) -> Option<f64> {
    let len = stats.monthly_growth.len();
    if len < 2 {
        return None;
    }
    let previous = stats.monthly_growth[len - 2].followers;
    let latest = stats.monthly_growth[len - 1].followers;
    if previous == 0 {
        return None;
    }
    Some((latest as f64 - previous as f64) / previous as f64 * 100.0)
}

/// Month-over-month growth, averaged over platforms with enough history.
pub fn growth_summary(record: &BaselineRecord) -> GrowthSummary {
    let instagram = series_growth(&record.instagram);
    let tiktok = series_growth(&record.tiktok);

    let with_data: Vec<f64> = [instagram, tiktok].into_iter().flatten().collect();
    let average = if with_data.is_empty() {
        0.0
    } else {
        with_data.iter().sum::<f64>() / with_data.len() as f64
    };
    let average = round2(average);

    let trend = if average > 2.0 {
        Trend::Growing
    } else if average < -1.0 {
        Trend::Declining
    } else {
        Trend::Stable
    };

    GrowthSummary {
        monthly_growth_rate: average,
        instagram: round2(instagram.unwrap_or(0.0)),
        tiktok: round2(tiktok.unwrap_or(0.0)),
        trend,
    }
}

/// Engagement relative to the tier benchmark.
pub fn engagement_quality(record: &BaselineRecord) -> EngagementQuality {
    let benchmark = InfluencerTier::for_followers(total_followers(record)).engagement_benchmark();
    let actual = weighted_engagement(record);
    let ratio = actual / benchmark;

    let (quality, score) = if ratio >= 1.5 {
        ("excellent", 90.0 + ((ratio - 1.5) * 20.0).min(10.0))
    } else if ratio >= 1.2 {
        ("very_good", 80.0 + (ratio - 1.2) / 0.3 * 10.0)
    } else if ratio >= 0.8 {
        ("good", 60.0 + (ratio - 0.8) / 0.4 * 20.0)
    } else if ratio >= 0.5 {
        ("average", 40.0 + (ratio - 0.5) / 0.3 * 20.0)
    } else {
        ("below_average", (ratio * 80.0).max(0.0))
    };

    EngagementQuality {
        quality,
        score: score.round() as u32,
        ratio: round2(ratio),
        benchmark,
    }
}

/// Estimated per-post sponsorship earnings range.
pub fn estimate_earnings(record: &BaselineRecord) -> EarningsRange {
    let followers = total_followers(record);
    if followers == 0 {
        return EarningsRange {
            min: 0,
            max: 0,
            currency: "EUR",
        };
    }

    let base_rate = InfluencerTier::for_followers(followers).base_rate();
    let engagement_multiplier =
        (weighted_engagement(record) / DEFAULT_TIKTOK_ENGAGEMENT).clamp(0.5, 2.0);
    let multiplier = niche_multiplier(record.profile.niche.as_deref());

    let base = followers as f64 / 1000.0 * base_rate * engagement_multiplier * multiplier;
    EarningsRange {
        min: (base * 0.7).round() as u64,
        max: (base * 1.3).round() as u64,
        currency: "EUR",
    }
}

/// Follower share per platform in whole percent.
pub fn platform_split(record: &BaselineRecord) -> PlatformSplit {
    let total = total_followers(record);
    if total == 0 {
        return PlatformSplit {
            instagram_pct: 0,
            tiktok_pct: 0,
        };
    }
    PlatformSplit {
        instagram_pct: (record.instagram.followers as f64 / total as f64 * 100.0).round() as u32,
        tiktok_pct: (record.tiktok.followers as f64 / total as f64 * 100.0).round() as u32,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BaselineRecord {
        serde_json::from_str(
            r#"{
                "profile": {
                    "name": "Samantha",
                    "username": "samanthacrianza",
                    "bio": "Asesora en Crianza Respetuosa",
                    "niche": "crianza-educacion-infantil"
                },
                "instagram": {
                    "handle": "samanthacrianza",
                    "followers": 46200,
                    "engagementRate": 7.8,
                    "monthlyGrowth": [
                        { "month": "2025-05", "followers": 44000 },
                        { "month": "2025-06", "followers": 46200 }
                    ]
                },
                "tiktok": {
                    "handle": "samanthacrianza",
                    "followers": 78400,
                    "averageViews": 45200,
                    "averageLikes": 3100
                }
            }"#,
        )
        .unwrap()
    }

    fn empty_record() -> BaselineRecord {
        serde_json::from_str(
            r#"{
                "profile": { "name": "", "username": "" },
                "instagram": { "handle": "", "followers": 0 },
                "tiktok": { "handle": "", "followers": 0 }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_total_followers() {
        assert_eq!(total_followers(&record()), 124_600);
        assert_eq!(total_followers(&empty_record()), 0);
    }

    #[test]
    fn test_weighted_engagement_blends_platforms() {
        let record = record();
        // TikTok engagement = 3100 / 78400 * 100 ≈ 3.954
        let expected = 7.8 * (46_200.0 / 124_600.0) + (3100.0 / 78_400.0 * 100.0) * (78_400.0 / 124_600.0);
        assert!((weighted_engagement(&record) - round2(expected)).abs() < 0.01);
    }

    #[test]
    fn test_empty_record_yields_zero_defaults() {
        let record = empty_record();
        assert_eq!(weighted_engagement(&record), 0.0);
        assert_eq!(monthly_reach(&record), 0);
        assert_eq!(average_views(&record), 0);
        assert_eq!(estimate_earnings(&record).max, 0);
        let split = platform_split(&record);
        assert_eq!((split.instagram_pct, split.tiktok_pct), (0, 0));
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(InfluencerTier::for_followers(9_999), InfluencerTier::Nano);
        assert_eq!(InfluencerTier::for_followers(10_000), InfluencerTier::Micro);
        assert_eq!(InfluencerTier::for_followers(124_600), InfluencerTier::Mid);
        assert_eq!(InfluencerTier::for_followers(500_000), InfluencerTier::Macro);
        assert_eq!(InfluencerTier::for_followers(1_000_000), InfluencerTier::Mega);
    }

    #[test]
    fn test_growth_summary_uses_platforms_with_history() {
        let growth = growth_summary(&record());
        // Instagram: (46200 - 44000) / 44000 = 5%; TikTok has no series.
        assert_eq!(growth.instagram, 5.0);
        assert_eq!(growth.tiktok, 0.0);
        assert_eq!(growth.monthly_growth_rate, 5.0);
        assert_eq!(growth.trend, Trend::Growing);

        let flat = growth_summary(&empty_record());
        assert_eq!(flat.monthly_growth_rate, 0.0);
        assert_eq!(flat.trend, Trend::Stable);
    }

    #[test]
    fn test_average_views_mixes_sources() {
        // Instagram: no likes -> excluded. TikTok: 45200.
        let mut rec = record();
        rec.instagram.average_likes = None;
        assert_eq!(average_views(&rec), 45_200);

        rec.instagram.average_likes = Some(2000);
        // (2000 * 15 + 45200) / 2
        assert_eq!(average_views(&rec), 37_600);
    }

    #[test]
    fn test_influencer_score_is_bounded() {
        assert!(influencer_score(&record()) <= 100);
        // Empty record still computes: log10(1) = 0, everything else 0.
        assert_eq!(influencer_score(&empty_record()), 0);
    }

    #[test]
    fn test_engagement_quality_against_benchmark() {
        let quality = engagement_quality(&record());
        // Mid tier benchmark is 2.4; blended rate is well above it.
        assert_eq!(quality.benchmark, 2.4);
        assert!(quality.ratio > 1.5);
        assert_eq!(quality.quality, "excellent");
        assert!(quality.score >= 90 && quality.score <= 100);
    }

    #[test]
    fn test_earnings_scale_with_engagement() {
        let earnings = estimate_earnings(&record());
        assert!(earnings.min > 0);
        assert!(earnings.max > earnings.min);
        assert_eq!(earnings.currency, "EUR");
    }

    #[test]
    fn test_platform_split_sums_to_about_100() {
        let split = platform_split(&record());
        assert_eq!(split.instagram_pct, 37);
        assert_eq!(split.tiktok_pct, 63);
    }

    #[test]
    fn test_derive_is_total() {
        let metrics = DerivedMetrics::derive(&record());
        assert_eq!(metrics.total_followers, 124_600);
        assert_eq!(metrics.tier, InfluencerTier::Mid);
    }
}
