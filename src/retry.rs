//! Bounded retry around one whois exchange.
//!
//! Transport errors and rate limiting are retried after a fixed backoff.
//! Malformed responses and foreign registrars end the domain at once, since
//! asking again cannot change the answer.

use crate::{
    config::Config,
    errors::{QueryError, WhoisError},
    events::{EventSink, QueryEvent},
    limiter::RateLimiter,
    parser::{QueryOutcome, RegistrationData, ResponseParser},
    whois::WhoisTransport,
};
use std::{sync::Arc, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; at most `max_retries + 1` queries.
    pub max_retries: u32,
    /// Full wait inserted before each retry.
    pub backoff: Duration,
    /// Minimum gap between the starts of two transport calls.
    pub min_gap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.backoff(),
            min_gap: config.base_delay(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

enum AttemptState {
    Attempting(u32),
    Done(Result<RegistrationData, QueryError>),
}

enum AttemptResult {
    Finished(Result<RegistrationData, QueryError>),
    Retryable(QueryError),
}

pub struct RetryController {
    transport: Arc<dyn WhoisTransport>,
    parser: ResponseParser,
    limiter: Arc<RateLimiter>,
    events: Arc<dyn EventSink>,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(
        transport: Arc<dyn WhoisTransport>,
        parser: ResponseParser,
        limiter: Arc<RateLimiter>,
        events: Arc<dyn EventSink>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            parser,
            limiter,
            events,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Query `domain` until it succeeds, fails terminally, or runs out of retries.
    pub async fn resolve(&self, domain: &str) -> Result<RegistrationData, QueryError> {
        let mut state = AttemptState::Attempting(1);

        loop {
            state = match state {
                AttemptState::Attempting(attempt) => match self.attempt(domain, attempt).await {
                    AttemptResult::Finished(result) => AttemptState::Done(result),
                    AttemptResult::Retryable(_) if attempt < self.policy.max_attempts() => {
                        self.events.emit(&QueryEvent::RetryScheduled {
                            domain: domain.to_string(),
                            next_attempt: attempt + 1,
                            backoff: self.policy.backoff,
                        });
                        self.limiter.pause(self.policy.backoff).await;
                        AttemptState::Attempting(attempt + 1)
                    }
                    AttemptResult::Retryable(err) => AttemptState::Done(Err(QueryError::RetryBudgetExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    })),
                },
                AttemptState::Done(result) => return result,
            };
        }
    }

    async fn attempt(&self, domain: &str, attempt: u32) -> AttemptResult {
        self.limiter.acquire(self.policy.min_gap).await;
        self.events.emit(&QueryEvent::AttemptStarted {
            domain: domain.to_string(),
            attempt,
            max_attempts: self.policy.max_attempts(),
        });

        let result = match self.transport.query(domain).await {
            Ok(raw) => match self.parser.parse(&raw) {
                QueryOutcome::Success(data) => AttemptResult::Finished(Ok(data)),
                QueryOutcome::TerminalFailure(failure) => AttemptResult::Finished(Err(failure.into())),
                QueryOutcome::RetryableFailure(failure) => AttemptResult::Retryable(failure.into()),
            },
            Err(err @ WhoisError::InvalidDomain(_)) => AttemptResult::Finished(Err(err.into())),
            Err(err) if err.is_retryable() => AttemptResult::Retryable(err.into()),
            Err(err) => AttemptResult::Finished(Err(err.into())),
        };

        let failure = match &result {
            AttemptResult::Finished(Err(err)) => Some((err, false)),
            AttemptResult::Retryable(err) => Some((err, true)),
            AttemptResult::Finished(Ok(_)) => None,
        };
        if let Some((err, retryable)) = failure {
            self.events.emit(&QueryEvent::AttemptFailed {
                domain: domain.to_string(),
                attempt,
                kind: err.kind(),
                reason: err.to_string(),
                retryable,
            });
        }

        result
    }
}
