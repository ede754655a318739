//! Relay (proxy) rotation and the HTTP fetch seam.
//!
//! Outbound fetches route through third-party relay endpoints. Each endpoint
//! has its own request convention: some take the target URL raw, some expect
//! it percent-encoded as a query parameter, and some JSON-wrap the fetched
//! body. Failed relays are skipped until every relay has failed, at which
//! point the failure set resets; failures are transient hints, not bans.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::FetchError;

/// One relay endpoint and its request/response convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEndpoint {
    pub name: String,
    /// Prefix the target URL is appended to.
    pub base_url: String,
    /// Percent-encode the target before appending (query-parameter style).
    #[serde(default)]
    pub encode_target: bool,
    /// Field holding the fetched body when the relay JSON-wraps responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_field: Option<String>,
}

impl RelayEndpoint {
    /// Built-in relay list, tried in order.
    pub fn default_relays() -> Vec<RelayEndpoint> {
        vec![
            RelayEndpoint {
                name: "AllOrigins".to_string(),
                base_url: "https://api.allorigins.win/get?url=".to_string(),
                encode_target: true,
                response_field: Some("contents".to_string()),
            },
            RelayEndpoint {
                name: "CORS Anywhere".to_string(),
                base_url: "https://cors-anywhere.herokuapp.com/".to_string(),
                encode_target: false,
                response_field: None,
            },
            RelayEndpoint {
                name: "ThingProxy".to_string(),
                base_url: "https://thingproxy.freeboard.io/fetch/".to_string(),
                encode_target: false,
                response_field: None,
            },
        ]
    }

    /// Build the relay request URL for a target.
    pub fn request_url(&self, target: &str) -> String {
        if self.encode_target {
            format!("{}{}", self.base_url, urlencoding::encode(target))
        } else {
            format!("{}{}", self.base_url, target)
        }
    }

    /// Unwrap a relay response body into the fetched document.
    pub fn unwrap_response(&self, body: String) -> Result<String, FetchError> {
        match &self.response_field {
            None => Ok(body),
            Some(field) => serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| {
                    value
                        .get(field)
                        .and_then(|contents| contents.as_str().map(str::to_owned))
                })
                .ok_or_else(|| FetchError::RelayEnvelope {
                    field: field.clone(),
                }),
        }
    }
}

/// Ordered relay list with failure tracking.
///
/// `advance` marks the current relay failed and moves on, skipping relays
/// already marked. Once the failed set would cover the whole list it is
/// cleared first, so rotation never stalls.
pub struct RelayRotator {
    relays: Vec<RelayEndpoint>,
    cursor: usize,
    failed: HashSet<usize>,
}

impl RelayRotator {
    /// An empty list falls back to the built-in relays.
    pub fn new(relays: Vec<RelayEndpoint>) -> Self {
        let relays = if relays.is_empty() {
            RelayEndpoint::default_relays()
        } else {
            relays
        };
        Self {
            relays,
            cursor: 0,
            failed: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    pub fn current(&self) -> &RelayEndpoint {
        &self.relays[self.cursor]
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Mark the current relay failed and move to the next usable one.
    pub fn advance(&mut self) {
        self.failed.insert(self.cursor);
        if self.failed.len() >= self.relays.len() {
            debug!("all {} relays failed; resetting failure set", self.relays.len());
            self.failed.clear();
        }
        self.cursor = (self.cursor + 1) % self.relays.len();
        while self.failed.contains(&self.cursor) {
            self.cursor = (self.cursor + 1) % self.relays.len();
        }
    }
}

/// Transport seam: fetch a URL and return its body as text.
///
/// Tests inject scripted implementations; production uses [`HttpFetcher`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwest-backed fetcher with the configured user agent and timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9,es;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Relay-mediated fetch client shared by all in-flight operations.
///
/// One call = one attempt through the current relay; the caller decides when
/// to `mark_failure` and retry. Rotator reads and advances each happen inside
/// a single lock acquisition, never across an await.
pub struct RelayClient {
    rotator: Mutex<RelayRotator>,
    fetcher: Arc<dyn PageFetcher>,
}

impl RelayClient {
    pub fn new(rotator: RelayRotator, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            rotator: Mutex::new(rotator),
            fetcher,
        }
    }

    /// Fetch `target` once through the current relay.
    pub async fn fetch_once(&self, target: &str) -> Result<String, FetchError> {
        let relay = self.rotator.lock().await.current().clone();
        let url = relay.request_url(target);
        debug!("fetching {} via relay {}", target, relay.name);
        let body = self.fetcher.fetch_text(&url).await?;
        relay.unwrap_response(body)
    }

    /// Report that the relay used for the last attempt failed.
    pub async fn mark_failure(&self) {
        let mut rotator = self.rotator.lock().await;
        let failed = rotator.current().name.clone();
        rotator.advance();
        debug!(
            "relay {} marked failed; switching to {}",
            failed,
            rotator.current().name
        );
    }
}
