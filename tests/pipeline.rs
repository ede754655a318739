//! End-to-end pipeline tests with scripted transports.
//!
//! These exercise the full orchestrator state machine and the reconciler
//! against fake fetchers, with in-memory stores for both cache tiers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use profilepulse::cache::{MemoryStore, TieredCache};
use profilepulse::config::{CachePolicy, PlatformPolicy};
use profilepulse::error::FetchError;
use profilepulse::models::{CacheKey, DataKind, Platform};
use profilepulse::scrapers::{
    ComplianceChecker, PageFetcher, PolitenessGate, RelayClient, RelayRotator,
    ScrapingOrchestrator,
};

const PROFILE_PAGE: &str = r#"<html><head>
    <title>Samantha (@samanthacrianza)</title>
    <meta property="og:description" content="46,200 Followers, 380 Following, 210 Posts">
    </head><body></body></html>"#;

/// Scripted transport: answers robots.txt and profile URLs, records every
/// request it sees.
struct ScriptedFetcher {
    robots_body: Option<String>,
    profile_body: Option<String>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new(robots_body: Option<&str>, profile_body: Option<&str>) -> Self {
        Self {
            robots_body: robots_body.map(str::to_string),
            profile_body: profile_body.map(str::to_string),
            requests: Mutex::new(Vec::new()),
        }
    }

    async fn profile_requests(&self) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|url| !url.contains("robots.txt"))
            .count()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().await.push(url.to_string());

        let body = if url.contains("robots.txt") {
            self.robots_body.clone()
        } else {
            self.profile_body.clone()
        };

        body.ok_or_else(|| FetchError::Request {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

struct Pipeline {
    orchestrator: ScrapingOrchestrator,
    cache: Arc<TieredCache>,
    fetcher: Arc<ScriptedFetcher>,
}

fn pipeline(fetcher: ScriptedFetcher, respect_robots: bool) -> Pipeline {
    let fetcher = Arc::new(fetcher);
    // Single direct relay so scripted bodies pass through unwrapped.
    let relays = vec![profilepulse::scrapers::RelayEndpoint {
        name: "direct".to_string(),
        base_url: String::new(),
        encode_target: false,
        response_field: None,
    }];
    let relay = Arc::new(RelayClient::new(
        RelayRotator::new(relays),
        fetcher.clone() as Arc<dyn PageFetcher>,
    ));
    let compliance = ComplianceChecker::new(relay.clone(), respect_robots);
    let gate = Arc::new(PolitenessGate::new(
        HashMap::new(),
        Duration::from_millis(0),
    ));
    let cache = Arc::new(TieredCache::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    ));

    let policies: HashMap<Platform, PlatformPolicy> = Platform::ALL
        .iter()
        .map(|p| (*p, PlatformPolicy::default_for(*p)))
        .collect();

    let orchestrator = ScrapingOrchestrator::new(
        compliance,
        cache.clone(),
        gate,
        relay,
        policies,
        CachePolicy::default(),
    );

    Pipeline {
        orchestrator,
        cache,
        fetcher,
    }
}

fn profile_key(username: &str) -> CacheKey {
    CacheKey::new(Platform::Instagram, username, DataKind::Profile)
}

#[tokio::test]
async fn compliance_block_skips_the_network_entirely() {
    let fetcher = ScriptedFetcher::new(Some("User-agent: *\nDisallow: /"), Some(PROFILE_PAGE));
    let pipeline = pipeline(fetcher, true);

    let snapshot = pipeline
        .orchestrator
        .fetch_profile(Platform::Instagram, "samanthacrianza")
        .await;

    assert!(!snapshot.retrieved_successfully);
    assert!(snapshot.error_reason.is_some());
    // The profile URL was never requested.
    assert_eq!(pipeline.fetcher.profile_requests().await, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_relays_fall_back_without_poisoning_the_cache() {
    // No bodies at all: every attempt errors.
    let fetcher = ScriptedFetcher::new(None, None);
    let pipeline = pipeline(fetcher, false);

    let snapshot = pipeline
        .orchestrator
        .fetch_profile(Platform::Instagram, "samanthacrianza")
        .await;

    assert!(!snapshot.retrieved_successfully);
    // max_retries attempts, then fallback.
    assert_eq!(pipeline.fetcher.profile_requests().await, 3);
    // Fallback placeholders are never cached.
    assert!(pipeline.cache.get(&profile_key("samanthacrianza")).await.is_none());
}

#[tokio::test]
async fn successful_fetch_caches_and_short_circuits_the_next_one() {
    let fetcher = ScriptedFetcher::new(Some("User-agent: *\nDisallow: /private/"), Some(PROFILE_PAGE));
    let pipeline = pipeline(fetcher, true);

    let first = pipeline
        .orchestrator
        .fetch_profile(Platform::Instagram, "samanthacrianza")
        .await;
    assert!(first.retrieved_successfully);
    assert_eq!(first.follower_count, 46_200);
    assert_eq!(pipeline.fetcher.profile_requests().await, 1);

    // Cache hit: no second network fetch.
    let second = pipeline
        .orchestrator
        .fetch_profile(Platform::Instagram, "samanthacrianza")
        .await;
    assert!(second.retrieved_successfully);
    assert_eq!(second.follower_count, 46_200);
    assert_eq!(pipeline.fetcher.profile_requests().await, 1);
}

#[tokio::test]
async fn unreachable_robots_policy_is_optimistic() {
    // robots.txt errors out, profile page works: fetch proceeds.
    let fetcher = ScriptedFetcher::new(None, Some(PROFILE_PAGE));
    let pipeline = pipeline(fetcher, true);

    let snapshot = pipeline
        .orchestrator
        .fetch_profile(Platform::Instagram, "samanthacrianza")
        .await;

    assert!(snapshot.retrieved_successfully);
    assert_eq!(snapshot.follower_count, 46_200);
}

#[tokio::test]
async fn extraction_failure_falls_back_and_does_not_cache() {
    let fetcher = ScriptedFetcher::new(None, Some("<html><body>useless page</body></html>"));
    let pipeline = pipeline(fetcher, false);

    let snapshot = pipeline
        .orchestrator
        .fetch_profile(Platform::Instagram, "samanthacrianza")
        .await;

    assert!(!snapshot.retrieved_successfully);
    // Extraction failure is terminal for the attempt: exactly one fetch.
    assert_eq!(pipeline.fetcher.profile_requests().await, 1);
    assert!(pipeline.cache.get(&profile_key("samanthacrianza")).await.is_none());
}
