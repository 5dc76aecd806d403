//! # Domain Expiry Library
//!
//! Watches registration expiry for a list of domains held at one registrar.
//!
//! ## Features
//!
//! - Single fixed whois endpoint, queried strictly one domain at a time
//! - Rate limiting with a guaranteed minimum gap between queries
//! - Bounded retry for transient failures, immediate bail for permanent ones
//! - A failing domain is logged and skipped, never fatal to the batch
//! - Configurable urgency buckets (past / urgent / soon / recent / ok)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_expiry::{DomainEntry, ExpiryMonitor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = ExpiryMonitor::new()?;
//!     let records = monitor.check(&[DomainEntry::new("rezo.net")]).await;
//!
//!     for record in records {
//!         println!("{}: {} days left ({})", record.domain(), record.days_left, record.urgency_class);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod classify;
pub mod config;
pub mod errors;
pub mod events;
pub mod limiter;
pub mod loader;
pub mod parser;
pub mod report;
pub mod retry;
pub mod whois;

// Re-export main types for easy access
pub use crate::batch::{BatchDriver, BatchReport, BatchSummary, CancellationFlag};
pub use crate::classify::{classify, Thresholds, UrgencyClass};
pub use crate::config::Config;
pub use crate::errors::{QueryError, WhoisError};
pub use crate::events::{EventSink, QueryEvent};
pub use crate::parser::{QueryOutcome, RegistrationData, ResponseParser};
pub use crate::whois::{TcpWhoisTransport, WhoisTransport};

use crate::limiter::{Clock, RateLimiter, TokioClock};
use crate::retry::{RetryController, RetryPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SECONDS_PER_DAY: i64 = 86_400;

/// One entry of the monitored domain list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DomainEntry {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: None,
            description: None,
            url: None,
        }
    }
}

/// A domain whose expiry was successfully checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    #[serde(flatten)]
    pub entry: DomainEntry,
    pub registrar: String,
    pub expiration_date: DateTime<Utc>,
    pub expiration_raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    pub days_left: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_update: Option<i64>,
    #[serde(rename = "class")]
    pub urgency_class: UrgencyClass,
    pub checked_at: DateTime<Utc>,
}

impl DomainRecord {
    /// Build the record from parsed whois data; day counts are relative to `now`.
    pub fn finalize(entry: DomainEntry, data: RegistrationData, now: DateTime<Utc>, thresholds: &Thresholds) -> Self {
        let days_left = days_between(now, data.expiration);
        let days_since_update = data.updated.map(|updated| days_between(updated, now));

        Self {
            entry,
            registrar: data.registrar,
            expiration_date: data.expiration,
            expiration_raw: data.expiration_raw,
            updated_date: data.updated,
            days_left,
            days_since_update,
            urgency_class: thresholds.classify(days_left, days_since_update),
            checked_at: now,
        }
    }

    pub fn domain(&self) -> &str {
        &self.entry.domain
    }
}

/// Whole days from `from` to `to`, rounded toward negative infinity.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// High-level expiry monitor wired to the configured whois server
pub struct ExpiryMonitor {
    config: Arc<Config>,
    driver: BatchDriver,
}

impl ExpiryMonitor {
    /// Create a monitor from configuration loaded from the environment
    pub fn new() -> Result<Self, WhoisError> {
        let config = Arc::new(Config::load().map_err(WhoisError::ConfigError)?);
        Ok(Self::new_with_config(config))
    }

    /// Create a monitor with custom configuration
    pub fn new_with_config(config: Arc<Config>) -> Self {
        let transport = Arc::new(TcpWhoisTransport::new(&config));
        Self::with_parts(config, transport, Arc::new(TokioClock), Arc::new(crate::events::TracingSink))
    }

    /// Create a monitor with an injected transport, clock and event sink
    pub fn with_parts(
        config: Arc<Config>,
        transport: Arc<dyn WhoisTransport>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let controller = RetryController::new(
            transport,
            ResponseParser::new(config.supported_registrar.clone(), config.rate_limit_marker.clone()),
            Arc::new(RateLimiter::new(clock)),
            events.clone(),
            RetryPolicy::from_config(&config),
        );
        let driver = BatchDriver::new(controller, config.thresholds, config.delay_placement, events);

        Self { config, driver }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle that stops the batch before its next domain.
    pub fn cancellation(&self) -> CancellationFlag {
        self.driver.cancellation()
    }

    /// Check every domain and return the ones that resolved, in input order.
    pub async fn check(&self, domains: &[DomainEntry]) -> Vec<DomainRecord> {
        self.driver.run(domains).await
    }

    pub async fn check_with_summary(&self, domains: &[DomainEntry]) -> BatchReport {
        self.driver.run_with_summary(domains).await
    }
}
