//! Sequential, failure-tolerant batch over a domain list.

use crate::{
    classify::Thresholds,
    config::DelayPlacement,
    events::{EventSink, QueryEvent},
    retry::RetryController,
    DomainEntry, DomainRecord,
};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Cooperative stop signal, checked between domains only.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub records: Vec<DomainRecord>,
    pub summary: BatchSummary,
}

pub struct BatchDriver {
    controller: RetryController,
    thresholds: Thresholds,
    placement: DelayPlacement,
    base_delay: Duration,
    events: Arc<dyn EventSink>,
    cancel: CancellationFlag,
}

impl BatchDriver {
    pub fn new(
        controller: RetryController,
        thresholds: Thresholds,
        placement: DelayPlacement,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let base_delay = controller.policy().min_gap;
        Self {
            controller,
            thresholds,
            placement,
            base_delay,
            events,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Check every domain in order and return the successful records.
    pub async fn run(&self, domains: &[DomainEntry]) -> Vec<DomainRecord> {
        self.run_with_summary(domains).await.records
    }

    pub async fn run_with_summary(&self, domains: &[DomainEntry]) -> BatchReport {
        let limiter = self.controller.limiter();
        let mut records = Vec::with_capacity(domains.len());
        let mut summary = BatchSummary {
            total: domains.len(),
            ..BatchSummary::default()
        };

        self.events.emit(&QueryEvent::BatchStarted { total: domains.len() });

        for (index, entry) in domains.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.skipped = domains.len() - index;
                self.events.emit(&QueryEvent::BatchCancelled {
                    processed: index,
                    remaining: summary.skipped,
                });
                break;
            }

            if self.placement.before() {
                limiter.pause(self.base_delay).await;
            }

            match self.controller.resolve(&entry.domain).await {
                Ok(data) => {
                    let now = limiter.clock().wall_now();
                    let record = DomainRecord::finalize(entry.clone(), data, now, &self.thresholds);
                    self.events.emit(&QueryEvent::DomainSucceeded {
                        domain: record.domain().to_string(),
                        expiration: record.expiration_raw.clone(),
                        days_left: record.days_left,
                        urgency: record.urgency_class,
                    });
                    summary.succeeded += 1;
                    records.push(record);
                }
                Err(err) => {
                    self.events.emit(&QueryEvent::DomainFailed {
                        domain: entry.domain.clone(),
                        kind: err.kind(),
                        reason: err.to_string(),
                    });
                    summary.failed += 1;
                }
            }

            if self.placement.after() && index + 1 < domains.len() {
                limiter.pause(self.base_delay).await;
            }
        }

        self.events.emit(&QueryEvent::BatchFinished {
            succeeded: summary.succeeded,
            failed: summary.failed,
        });

        BatchReport { records, summary }
    }
}
