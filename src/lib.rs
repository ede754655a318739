//! profilepulse: social profile metrics acquisition and reconciliation.
//!
//! Ingests public social-profile pages through best-effort scraping,
//! reconciles the results with a trusted manual baseline under sanity
//! constraints, and caches outcomes so the display layer can render metrics
//! without re-fetching. Every failure mode degrades to the manual baseline;
//! only a missing baseline is fatal.

pub mod analytics;
pub mod baseline;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod scrapers;

pub use baseline::BaselineRecord;
pub use config::Settings;
pub use context::AppContext;
pub use models::{Platform, ProfileSnapshot};
pub use reconcile::{Reconciler, UpdateEvent};
