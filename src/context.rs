//! Process-scoped assembly of the scraping and reconciliation stack.
//!
//! Cache and rate-limiter state are explicit instances shared by every
//! in-flight operation, constructed here and injected into the orchestrator.
//! Nothing is module-global, so tests can assemble their own hermetic stacks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::cache::{FileStore, MemoryStore, TieredCache};
use crate::config::Settings;
use crate::reconcile::Reconciler;
use crate::scrapers::{
    ComplianceChecker, HttpFetcher, PageFetcher, PolitenessGate, RelayClient, RelayRotator,
    ScrapingOrchestrator,
};

/// Everything a command needs to run one or more update cycles.
pub struct AppContext {
    pub settings: Settings,
    pub cache: Arc<TieredCache>,
    pub reconciler: Arc<Reconciler>,
}

impl AppContext {
    /// Build the full stack from settings, loading the baseline record.
    ///
    /// Fails hard when the baseline is missing or corrupt; everything else
    /// in the stack degrades at runtime instead of failing here.
    pub async fn initialize(settings: Settings) -> anyhow::Result<Self> {
        settings
            .ensure_directories()
            .context("creating data directories")?;

        let fetcher: Arc<dyn PageFetcher> = Arc::new(
            HttpFetcher::new(
                &settings.user_agent,
                Duration::from_secs(settings.request_timeout),
            )
            .context("building HTTP client")?,
        );

        Self::initialize_with_fetcher(settings, fetcher).await
    }

    /// Build the stack with an injected transport, for tests and tooling.
    pub async fn initialize_with_fetcher(
        settings: Settings,
        fetcher: Arc<dyn PageFetcher>,
    ) -> anyhow::Result<Self> {
        let relay = Arc::new(RelayClient::new(
            RelayRotator::new(settings.relays.clone()),
            fetcher,
        ));

        let compliance = ComplianceChecker::new(relay.clone(), settings.respect_robots);

        let delays: HashMap<String, Duration> = settings
            .policies
            .iter()
            .map(|(platform, policy)| (platform.domain().to_string(), policy.request_delay()))
            .collect();
        let gate = Arc::new(PolitenessGate::new(delays, Duration::from_millis(2000)));

        let cache = Arc::new(TieredCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FileStore::new(settings.cache_dir())),
        ));

        let orchestrator = Arc::new(ScrapingOrchestrator::new(
            compliance,
            cache.clone(),
            gate,
            relay,
            settings.policies.clone(),
            settings.cache.clone(),
        ));

        let reconciler = Arc::new(
            Reconciler::load(&settings.baseline_path(), orchestrator)
                .context("loading manual baseline record")?,
        );

        Ok(Self {
            settings,
            cache,
            reconciler,
        })
    }
}
