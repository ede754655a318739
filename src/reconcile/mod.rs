//! Reconciliation of scraped snapshots into the trusted baseline.
//!
//! The reconciler owns the baseline record and is its only writer. Scraped
//! values overwrite stored ones only inside a sanity bound; everything else
//! is recorded but discarded. Merges serialize through the record's write
//! lock, so no two concurrent merges interleave on the same platform field.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::analytics::DerivedMetrics;
use crate::baseline::{BaselineRecord, DataQuality, Provenance};
use crate::error::BaselineError;
use crate::models::{Platform, ProfileSnapshot};
use crate::scrapers::ScrapingOrchestrator;

/// A candidate follower count is discarded when its relative deviation from
/// the current value reaches this threshold.
pub const MAX_RELATIVE_DEVIATION: f64 = 0.5;

/// Lifecycle events consumed by the presentation layer.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    UpdateStarted,
    UpdateCompleted(CycleSummary),
    UpdateFailed(String),
    ManualUpdate {
        platform: Platform,
        field: String,
        value: serde_json::Value,
    },
}

/// Outcome of one update cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub fallbacks: usize,
    pub overall_quality: DataQuality,
}

/// What happened to one merged snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeOutcome {
    /// Value written, provenance upgraded to live.
    Accepted,
    /// Deviation at or above the bound; prior value kept.
    Rejected { deviation: f64 },
    /// Unsuccessful snapshot; attempt recorded, nothing changed.
    Skipped,
}

/// Baseline plus derived metrics, as served to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsView {
    pub record: BaselineRecord,
    pub metrics: DerivedMetrics,
}

/// Merges scraped snapshots into the baseline record under sanity
/// constraints, maintains provenance, and emits lifecycle events.
pub struct Reconciler {
    record: RwLock<BaselineRecord>,
    orchestrator: Arc<ScrapingOrchestrator>,
    events: broadcast::Sender<UpdateEvent>,
}

impl Reconciler {
    pub fn new(record: BaselineRecord, orchestrator: Arc<ScrapingOrchestrator>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            record: RwLock::new(record),
            orchestrator,
            events,
        }
    }

    /// Load the baseline from disk and build a reconciler over it.
    /// A missing or corrupt baseline is a hard initialization failure.
    pub fn load(
        path: &std::path::Path,
        orchestrator: Arc<ScrapingOrchestrator>,
    ) -> Result<Self, BaselineError> {
        let record = BaselineRecord::load(path)?;
        Ok(Self::new(record, orchestrator))
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: UpdateEvent) {
        // No receivers is fine; events are best-effort notifications.
        let _ = self.events.send(event);
    }

    /// Merge one snapshot into the baseline.
    ///
    /// Unsuccessful snapshots only record the attempt. Successful ones are
    /// accepted when the relative deviation from the current value is below
    /// the bound; a current value of zero accepts unconditionally. Provenance
    /// moves to `live` only together with an accepted write, inside the same
    /// critical section.
    pub async fn merge(&self, platform: Platform, snapshot: &ProfileSnapshot) -> MergeOutcome {
        let mut record = self.record.write().await;
        let stats = record.platform_mut(platform);

        stats.last_scraped = Some(snapshot.retrieved_at);
        stats.scraped_successfully = Some(snapshot.retrieved_successfully);

        if !snapshot.retrieved_successfully {
            debug!(
                "recorded unsuccessful retrieval for {}; baseline untouched",
                platform
            );
            return MergeOutcome::Skipped;
        }

        let current = stats.followers;
        let candidate = snapshot.follower_count;

        if current > 0 {
            let deviation = (candidate as f64 - current as f64).abs() / current as f64;
            if deviation >= MAX_RELATIVE_DEVIATION {
                warn!(
                    "rejecting {} follower count {}: deviates {:.2} from baseline {}",
                    platform, candidate, deviation, current
                );
                return MergeOutcome::Rejected { deviation };
            }
        }

        stats.followers = candidate;
        record.metadata.sources.set(platform, Provenance::Live);
        record.metadata.data_quality.set(platform, DataQuality::Live);
        record.metadata.last_updated = Utc::now();
        info!("merged {} follower count {} into baseline", platform, candidate);
        MergeOutcome::Accepted
    }

    /// Run one full update cycle: fetch every configured platform
    /// concurrently, merge the results, and emit one completion event.
    /// Any subset of platforms failing is a normal outcome.
    pub async fn update_all(&self) -> CycleSummary {
        self.emit(UpdateEvent::UpdateStarted);

        let targets: Vec<(Platform, String)> = {
            let record = self.record.read().await;
            Platform::ALL
                .iter()
                .filter_map(|p| {
                    let handle = &record.platform(*p).handle;
                    (!handle.is_empty()).then(|| (*p, handle.clone()))
                })
                .collect()
        };

        if targets.is_empty() {
            let reason = "no platform handles configured".to_string();
            warn!("{}", reason);
            self.emit(UpdateEvent::UpdateFailed(reason));
            return CycleSummary {
                attempted: 0,
                accepted: 0,
                rejected: 0,
                fallbacks: 0,
                overall_quality: self.record.read().await.metadata.data_quality.overall,
            };
        }

        let fetches = targets
            .iter()
            .map(|(platform, handle)| self.orchestrator.fetch_profile(*platform, handle));
        let snapshots = join_all(fetches).await;

        let mut summary = CycleSummary {
            attempted: targets.len(),
            accepted: 0,
            rejected: 0,
            fallbacks: 0,
            overall_quality: DataQuality::Manual,
        };

        for ((platform, _), snapshot) in targets.iter().zip(snapshots.iter()) {
            match self.merge(*platform, snapshot).await {
                MergeOutcome::Accepted => summary.accepted += 1,
                MergeOutcome::Rejected { .. } => summary.rejected += 1,
                MergeOutcome::Skipped => summary.fallbacks += 1,
            }
        }

        {
            let mut record = self.record.write().await;
            record.metadata.last_updated = Utc::now();
            summary.overall_quality = record.metadata.data_quality.overall;
        }

        info!(
            "update cycle complete: {}/{} accepted, {} rejected, {} fallbacks",
            summary.accepted, summary.attempted, summary.rejected, summary.fallbacks
        );
        self.emit(UpdateEvent::UpdateCompleted(summary.clone()));
        summary
    }

    /// Apply a manual override to a platform field.
    ///
    /// Marks the platform's provenance as a hybrid override and its quality
    /// as manual, then emits a `ManualUpdate` event.
    pub async fn update_manual(
        &self,
        platform: Platform,
        field: &str,
        value: serde_json::Value,
    ) -> Result<(), String> {
        {
            let mut record = self.record.write().await;
            let stats = record.platform_mut(platform);

            match field {
                "followers" => {
                    stats.followers = value
                        .as_u64()
                        .ok_or_else(|| format!("{field} expects an unsigned integer"))?;
                }
                "engagementRate" => {
                    stats.engagement_rate = Some(
                        value
                            .as_f64()
                            .ok_or_else(|| format!("{field} expects a number"))?,
                    );
                }
                "averageViews" => {
                    stats.average_views = Some(
                        value
                            .as_u64()
                            .ok_or_else(|| format!("{field} expects an unsigned integer"))?,
                    );
                }
                "averageLikes" => {
                    stats.average_likes = Some(
                        value
                            .as_u64()
                            .ok_or_else(|| format!("{field} expects an unsigned integer"))?,
                    );
                }
                "handle" => {
                    stats.handle = value
                        .as_str()
                        .ok_or_else(|| format!("{field} expects a string"))?
                        .to_string();
                }
                other => return Err(format!("unknown field: {other}")),
            }

            record
                .metadata
                .sources
                .set(platform, Provenance::HybridOverride);
            record
                .metadata
                .data_quality
                .set(platform, DataQuality::Manual);
            record.metadata.last_updated = Utc::now();
        }

        info!("manual override applied: {}.{}", platform, field);
        self.emit(UpdateEvent::ManualUpdate {
            platform,
            field: field.to_string(),
            value,
        });
        Ok(())
    }

    /// Current baseline plus derived metrics.
    pub async fn snapshot(&self) -> MetricsView {
        let record = self.record.read().await.clone();
        let metrics = DerivedMetrics::derive(&record);
        MetricsView { record, metrics }
    }

    /// The interchange JSON document for the current record.
    pub async fn export(&self) -> serde_json::Value {
        self.record.read().await.export()
    }
}
