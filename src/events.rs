//! Structured outcome events emitted by the query pipeline.
//!
//! The retry controller and the batch driver never log directly. They emit
//! [`QueryEvent`]s into an injected [`EventSink`], which is the only trace of
//! domains that failed and were left out of the results.

use crate::classify::UrgencyClass;
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    BatchStarted {
        total: usize,
    },
    AttemptStarted {
        domain: String,
        attempt: u32,
        max_attempts: u32,
    },
    AttemptFailed {
        domain: String,
        attempt: u32,
        kind: &'static str,
        reason: String,
        retryable: bool,
    },
    RetryScheduled {
        domain: String,
        next_attempt: u32,
        backoff: Duration,
    },
    DomainSucceeded {
        domain: String,
        expiration: String,
        days_left: i64,
        urgency: UrgencyClass,
    },
    DomainFailed {
        domain: String,
        kind: &'static str,
        reason: String,
    },
    BatchCancelled {
        processed: usize,
        remaining: usize,
    },
    BatchFinished {
        succeeded: usize,
        failed: usize,
    },
}

impl QueryEvent {
    pub fn domain(&self) -> Option<&str> {
        match self {
            QueryEvent::AttemptStarted { domain, .. }
            | QueryEvent::AttemptFailed { domain, .. }
            | QueryEvent::RetryScheduled { domain, .. }
            | QueryEvent::DomainSucceeded { domain, .. }
            | QueryEvent::DomainFailed { domain, .. } => Some(domain),
            _ => None,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &QueryEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &QueryEvent) {
        match event {
            QueryEvent::BatchStarted { total } => {
                info!("Checking expiration of {} domains", total);
            }
            QueryEvent::AttemptStarted { domain, attempt, max_attempts } => {
                info!("Querying whois for {} (attempt {}/{})", domain, attempt, max_attempts);
            }
            QueryEvent::AttemptFailed { domain, attempt, reason, retryable, .. } => {
                if *retryable {
                    warn!("Attempt {} for {} failed: {}", attempt, domain, reason);
                } else {
                    debug!("Attempt {} for {} failed permanently: {}", attempt, domain, reason);
                }
            }
            QueryEvent::RetryScheduled { domain, next_attempt, backoff } => {
                info!("Retrying {} in {:?} (attempt {})", domain, backoff, next_attempt);
            }
            QueryEvent::DomainSucceeded { domain, expiration, days_left, urgency } => {
                info!("{} expires {} ({} days left, {})", domain, expiration, days_left, urgency);
            }
            QueryEvent::DomainFailed { domain, kind, reason } => {
                warn!(kind = *kind, "Skipping {}: {}", domain, reason);
            }
            QueryEvent::BatchCancelled { processed, remaining } => {
                warn!("Batch cancelled after {} domains, {} not checked", processed, remaining);
            }
            QueryEvent::BatchFinished { succeeded, failed } => {
                info!("Batch finished: {} succeeded, {} failed", succeeded, failed);
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<QueryEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QueryEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn failures(&self) -> Vec<QueryEvent> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, QueryEvent::DomainFailed { .. }))
            .collect()
    }

    pub fn attempts_for(&self, domain: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, QueryEvent::AttemptStarted { .. }) && event.domain() == Some(domain))
            .count()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &QueryEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

/// Sends each event to several sinks.
pub struct FanoutSink {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &QueryEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
