//! Three-state per-host circuit breaker (spec §4.5).
//!
//! State transitions are `Closed -> Open -> HalfOpen -> (Closed | Open)`,
//! observed monotonically per host (spec §5's ordering guarantee).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use nuget_util::errors::RestoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub max_failures: u32,
    pub open_timeout: Duration,
    pub max_half_open_requests: u32,
}

struct Inner {
    state: State,
    failures: u32,
    half_open_in_flight: u32,
    last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    host: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(host: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        CircuitBreaker {
            host: host.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failures: 0,
                half_open_in_flight: 0,
                last_failure: None,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Checks whether a call may proceed, admitting a bounded probe while
    /// half-open. Returns `CircuitOpen` when the call must be rejected.
    pub fn can_execute(&self) -> Result<(), RestoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => Ok(()),
            State::Open => {
                let elapsed_since_failure = inner
                    .last_failure
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed_since_failure >= self.config.open_timeout {
                    inner.state = State::HalfOpen;
                    inner.half_open_in_flight = 0;
                    self.admit_half_open(&mut inner)
                } else {
                    Err(RestoreError::CircuitOpen {
                        host: self.host.clone(),
                    })
                }
            }
            State::HalfOpen => self.admit_half_open(&mut inner),
        }
    }

    fn admit_half_open(&self, inner: &mut Inner) -> Result<(), RestoreError> {
        if inner.half_open_in_flight < self.config.max_half_open_requests {
            inner.half_open_in_flight += 1;
            Ok(())
        } else {
            Err(RestoreError::CircuitOpen {
                host: self.host.clone(),
            })
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.failures = 0;
            }
            State::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.state = State::Closed;
                inner.failures = 0;
            }
            State::Open => {
                // Defensive: should not occur since Open rejects calls
                // before they run, but a stray success must not leave the
                // breaker stuck open.
                inner.state = State::Closed;
                inner.failures = 0;
                inner.half_open_in_flight = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            State::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.max_failures {
                    inner.state = State::Open;
                }
            }
            State::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.state = State::Open;
            }
            State::Open => {}
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = State::Closed;
        inner.failures = 0;
        inner.half_open_in_flight = 0;
        inner.last_failure = None;
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Open)
    }
}

/// Wraps an HTTP-shaped operation with breaker accounting: gate before the
/// call, record failure on transport error or a 5xx response, record
/// success otherwise.
pub fn guard_http<T, E>(
    breaker: &CircuitBreaker,
    op: impl FnOnce() -> Result<HttpOutcome<T>, E>,
) -> Result<HttpOutcome<T>, RestoreError>
where
    E: std::fmt::Display,
{
    breaker.can_execute()?;
    match op() {
        Ok(outcome) => {
            if outcome.status >= 500 {
                breaker.record_failure();
            } else {
                breaker.record_success();
            }
            Ok(outcome)
        }
        Err(e) => {
            breaker.record_failure();
            Err(RestoreError::Protocol {
                source_name: breaker.host().to_string(),
                message: e.to_string(),
            })
        }
    }
}

pub struct HttpOutcome<T> {
    pub status: u16,
    pub body: T,
}
