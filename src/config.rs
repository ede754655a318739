//! Configuration management for profilepulse.
//!
//! `Settings` is the resolved runtime configuration; `Config` is the
//! optional-field structure loaded from a JSON config file and applied on
//! top of defaults. Defaults mirror the published politeness contracts for
//! each platform and must not be made more aggressive without review.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{DataKind, Platform};
use crate::scrapers::relay::RelayEndpoint;

/// Default profile cache TTL (2 hours).
pub const DEFAULT_PROFILE_TTL_MS: u64 = 7_200_000;
/// Default posts cache TTL (1 hour).
pub const DEFAULT_POSTS_TTL_MS: u64 = 3_600_000;
/// Default engagement cache TTL (30 minutes).
pub const DEFAULT_ENGAGEMENT_TTL_MS: u64 = 1_800_000;

/// Politeness and retry policy for one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformPolicy {
    /// Minimum delay between requests to the platform's domain, in ms.
    pub request_delay_ms: u64,
    /// Maximum fetch attempts before falling back.
    pub max_retries: u32,
    /// Exponential backoff multiplier between retries.
    pub backoff_multiplier: u32,
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        Self {
            request_delay_ms: 2000,
            max_retries: 3,
            backoff_multiplier: 2,
        }
    }
}

impl PlatformPolicy {
    /// Published minimum inter-request spacing per platform.
    pub fn default_for(platform: Platform) -> Self {
        match platform {
            Platform::Instagram => Self {
                request_delay_ms: 2000,
                ..Default::default()
            },
            Platform::Tiktok => Self {
                request_delay_ms: 3000,
                ..Default::default()
            },
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Per-kind cache expiry policy.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub profile_ttl: Duration,
    pub posts_ttl: Duration,
    pub engagement_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            profile_ttl: Duration::from_millis(DEFAULT_PROFILE_TTL_MS),
            posts_ttl: Duration::from_millis(DEFAULT_POSTS_TTL_MS),
            engagement_ttl: Duration::from_millis(DEFAULT_ENGAGEMENT_TTL_MS),
        }
    }
}

impl CachePolicy {
    pub fn ttl_for(&self, kind: DataKind) -> Duration {
        match kind {
            DataKind::Profile => self.profile_ttl,
            DataKind::Posts => self.posts_ttl,
            DataKind::Engagement => self.engagement_ttl,
        }
    }

    /// Longest configured TTL; used as the compaction horizon.
    pub fn max_ttl(&self) -> Duration {
        self.profile_ttl
            .max(self.posts_ttl)
            .max(self.engagement_ttl)
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Filename of the trusted manual baseline record.
    pub baseline_filename: String,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Whether to check crawl-permission policies before fetching.
    pub respect_robots: bool,
    /// Ordered relay endpoints for outbound fetches.
    pub relays: Vec<RelayEndpoint>,
    /// Per-platform politeness policies.
    pub policies: HashMap<Platform, PlatformPolicy>,
    /// Cache expiry policy.
    pub cache: CachePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/profilepulse/ for user data
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("profilepulse");

        let policies = Platform::ALL
            .iter()
            .map(|p| (*p, PlatformPolicy::default_for(*p)))
            .collect();

        Self {
            data_dir,
            baseline_filename: "manual-data.json".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout: 10,
            respect_robots: true,
            relays: RelayEndpoint::default_relays(),
            policies,
            cache: CachePolicy::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Full path to the manual baseline record.
    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir.join(&self.baseline_filename)
    }

    /// Directory holding the durable cache tier.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }

    /// Politeness policy for a platform.
    pub fn policy_for(&self, platform: Platform) -> PlatformPolicy {
        self.policies
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformPolicy::default_for(platform))
    }

    /// Warn about configurations that undercut the platform spacing floors.
    pub fn validate(&self) {
        for (platform, floor) in [(Platform::Instagram, 2000), (Platform::Tiktok, 3000)] {
            let delay = self.policy_for(platform).request_delay_ms;
            if delay < floor {
                warn!(
                    "{} request delay {}ms is below the {}ms floor",
                    platform, delay, floor
                );
            }
        }
        if self.relays.is_empty() {
            warn!("no relay endpoints configured; using built-in defaults");
        }
    }
}

/// Cache TTL overrides from the config file, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_ms: Option<u64>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Baseline record filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Whether to check crawl-permission policies before fetching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respect_robots: Option<bool>,
    /// Relay endpoints, tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relays: Vec<RelayEndpoint>,
    /// Per-platform politeness overrides.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub platforms: HashMap<Platform, PlatformPolicy>,
    /// Cache TTL overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheTtlConfig>,

    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config: Config = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref target) = self.target {
            settings.data_dir = self.resolve_path(target, base_dir);
        }
        if let Some(ref baseline) = self.baseline {
            settings.baseline_filename = baseline.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(respect) = self.respect_robots {
            settings.respect_robots = respect;
        }
        if !self.relays.is_empty() {
            settings.relays = self.relays.clone();
        }
        for (platform, policy) in &self.platforms {
            settings.policies.insert(*platform, policy.clone());
        }
        if let Some(ref ttls) = self.cache {
            if let Some(ms) = ttls.profile_ms {
                settings.cache.profile_ttl = Duration::from_millis(ms);
            }
            if let Some(ms) = ttls.posts_ms {
                settings.cache.posts_ttl = Duration::from_millis(ms);
            }
            if let Some(ms) = ttls.engagement_ms {
                settings.cache.engagement_ttl = Duration::from_millis(ms);
            }
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
    /// Override data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
pub async fn load_settings_with_options(options: LoadOptions) -> Settings {
    let config = match &options.config_path {
        Some(path) => Config::load_from_path(path).await.unwrap_or_default(),
        None => Config::default(),
    };

    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    config.apply_to_settings(&mut settings, &base_dir);

    // --data-dir override takes precedence
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }

    settings.validate();
    settings
}
