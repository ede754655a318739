//! Crawl-permission checking.
//!
//! Before the expensive cache/fetch path runs, the orchestrator asks whether
//! the target domain's robots policy blanket-disallows retrieval for all
//! agents. Absence of signal never blocks: any failure to retrieve or parse
//! the policy resolves to allowed, since the fallback path beneath us is the
//! legitimate degraded mode.

use std::sync::Arc;

use tracing::{debug, info};

use super::relay::RelayClient;

/// Checks a domain's crawl-permission policy through the relay client.
///
/// Results are not cached; callers re-check each fetch cycle, which keeps
/// compliance staleness below the profile TTL.
pub struct ComplianceChecker {
    client: Arc<RelayClient>,
    respect_robots: bool,
}

impl ComplianceChecker {
    pub fn new(client: Arc<RelayClient>, respect_robots: bool) -> Self {
        Self {
            client,
            respect_robots,
        }
    }

    /// Whether retrieval from `domain` is permitted.
    pub async fn is_allowed(&self, domain: &str) -> bool {
        if !self.respect_robots {
            return true;
        }

        let robots_url = format!("https://{domain}/robots.txt");
        match self.client.fetch_once(&robots_url).await {
            Ok(body) => {
                let allowed = !blanket_disallow(&body);
                if !allowed {
                    info!("robots policy disallows retrieval for {}", domain);
                }
                allowed
            }
            Err(e) => {
                debug!("could not retrieve robots policy for {}: {}", domain, e);
                true
            }
        }
    }
}

/// True when a `Disallow: /` rule applies to `User-agent: *`.
///
/// Only the blanket rule matters here: path-specific rules do not affect a
/// single profile-page fetch decision made at domain granularity.
pub fn blanket_disallow(robots: &str) -> bool {
    let mut applies_to_all = false;

    for line in robots.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match directive.trim().to_ascii_lowercase().as_str() {
            "user-agent" => applies_to_all = value == "*",
            "disallow" if applies_to_all && value == "/" => return true,
            _ => {}
        }
    }

    false
}
