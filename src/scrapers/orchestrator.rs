//! The fetch pipeline, expressed as an explicit state machine.
//!
//! `Compliance → CacheLookup → RateLimit → Fetch (retry loop) → Extract →
//! CacheWrite → Done`, with `Fallback` reachable from any state. Every
//! failure degrades to a placeholder snapshot; callers never see an error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::compliance::ComplianceChecker;
use super::extract::{adapter_for, ExtractionAdapter};
use super::rate_limiter::{backoff_delay, PolitenessGate};
use super::relay::RelayClient;
use crate::cache::TieredCache;
use crate::config::{CachePolicy, PlatformPolicy};
use crate::error::ScrapeError;
use crate::models::{CacheKey, DataKind, Platform, ProfileSnapshot};

/// Named pipeline states. Every transition lives in the single match inside
/// `fetch_profile`, so each fallback path is visible and testable.
enum FetchPhase {
    Compliance,
    CacheLookup,
    RateLimit,
    Fetch,
    Extract(String),
    CacheWrite(ProfileSnapshot),
    Done(ProfileSnapshot),
    Fallback(String),
}

/// Composes compliance, cache, politeness, relays, and extraction into one
/// "fetch platform profile" operation with full fallback.
///
/// All collaborators are explicit injected instances shared across in-flight
/// operations; nothing here is process-global.
pub struct ScrapingOrchestrator {
    compliance: ComplianceChecker,
    cache: Arc<TieredCache>,
    gate: Arc<PolitenessGate>,
    relay: Arc<RelayClient>,
    policies: HashMap<Platform, PlatformPolicy>,
    cache_policy: CachePolicy,
    adapters: HashMap<Platform, Box<dyn ExtractionAdapter>>,
}

impl ScrapingOrchestrator {
    pub fn new(
        compliance: ComplianceChecker,
        cache: Arc<TieredCache>,
        gate: Arc<PolitenessGate>,
        relay: Arc<RelayClient>,
        policies: HashMap<Platform, PlatformPolicy>,
        cache_policy: CachePolicy,
    ) -> Self {
        let adapters = Platform::ALL
            .iter()
            .map(|p| (*p, adapter_for(*p)))
            .collect();
        Self {
            compliance,
            cache,
            gate,
            relay,
            policies,
            cache_policy,
            adapters,
        }
    }

    fn policy(&self, platform: Platform) -> PlatformPolicy {
        self.policies
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformPolicy::default_for(platform))
    }

    /// Fetch one platform profile, degrading to a fallback snapshot on any
    /// unrecoverable failure. Never errors.
    pub async fn fetch_profile(&self, platform: Platform, username: &str) -> ProfileSnapshot {
        let key = CacheKey::new(platform, username, DataKind::Profile);
        let mut phase = FetchPhase::Compliance;

        loop {
            phase = match phase {
                FetchPhase::Compliance => {
                    if self.compliance.is_allowed(platform.domain()).await {
                        FetchPhase::CacheLookup
                    } else {
                        let blocked = ScrapeError::ComplianceBlocked {
                            domain: platform.domain().to_string(),
                        };
                        FetchPhase::Fallback(blocked.to_string())
                    }
                }

                FetchPhase::CacheLookup => match self.cache.get(&key).await {
                    Some(payload) => match serde_json::from_value::<ProfileSnapshot>(payload) {
                        Ok(snapshot) => {
                            debug!("cache hit for {}", key.storage_key());
                            FetchPhase::Done(snapshot)
                        }
                        Err(e) => {
                            // Corrupt payload is a miss, not a failure.
                            warn!("discarding undecodable cache entry {}: {}", key.storage_key(), e);
                            self.cache.remove(&key).await;
                            FetchPhase::RateLimit
                        }
                    },
                    None => FetchPhase::RateLimit,
                },

                FetchPhase::RateLimit => {
                    self.gate.acquire(platform.domain()).await;
                    FetchPhase::Fetch
                }

                FetchPhase::Fetch => {
                    let policy = self.policy(platform);
                    let target = platform.profile_url(username);
                    let mut body = None;
                    let mut last_error = String::new();

                    for attempt in 0..policy.max_retries {
                        match self.relay.fetch_once(&target).await {
                            Ok(markup) => {
                                body = Some(markup);
                                break;
                            }
                            Err(e) => {
                                warn!(
                                    "fetch attempt {}/{} for {} failed: {}",
                                    attempt + 1,
                                    policy.max_retries,
                                    target,
                                    e
                                );
                                last_error = e.to_string();
                                self.relay.mark_failure().await;
                                if attempt + 1 < policy.max_retries {
                                    let wait = backoff_delay(
                                        attempt,
                                        policy.request_delay(),
                                        policy.backoff_multiplier,
                                    );
                                    tokio::time::sleep(wait).await;
                                }
                            }
                        }
                    }

                    match body {
                        Some(markup) => FetchPhase::Extract(markup),
                        None => FetchPhase::Fallback(format!(
                            "all {} fetch attempts failed: {}",
                            policy.max_retries, last_error
                        )),
                    }
                }

                FetchPhase::Extract(markup) => {
                    let adapter = self
                        .adapters
                        .get(&platform)
                        .expect("adapters cover every platform");
                    let snapshot = adapter.extract(&markup, username);
                    if snapshot.retrieved_successfully {
                        FetchPhase::CacheWrite(snapshot)
                    } else {
                        let reason = snapshot
                            .error_reason
                            .unwrap_or_else(|| "no heuristic yielded a value".to_string());
                        FetchPhase::Fallback(ScrapeError::Extraction(reason).to_string())
                    }
                }

                FetchPhase::CacheWrite(snapshot) => {
                    // Only successful snapshots reach this state; fallback
                    // placeholders must not poison the cache for a TTL window.
                    match serde_json::to_value(&snapshot) {
                        Ok(payload) => {
                            self.cache
                                .put(&key, payload, self.cache_policy.ttl_for(DataKind::Profile))
                                .await;
                        }
                        Err(e) => warn!("could not serialize snapshot for cache: {}", e),
                    }
                    FetchPhase::Done(snapshot)
                }

                FetchPhase::Done(snapshot) => return snapshot,

                FetchPhase::Fallback(reason) => {
                    info!(
                        "degrading to fallback for {}/{}: {}",
                        platform, username, reason
                    );
                    return ProfileSnapshot::fallback(platform, username, reason);
                }
            };
        }
    }
}
