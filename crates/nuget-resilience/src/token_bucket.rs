//! Token bucket rate limiter (spec §4.4): capacity + refill, single lock,
//! atomic batch deduction, and a `wait` that sleeps for exactly the
//! computed deficit rather than polling.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use nuget_util::errors::{RestoreError, RestoreResult};

use crate::cancellation::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct TokenBucketConfig {
    pub capacity: f64,
    pub refill_rate: f64,
    pub initial_tokens: f64,
}

impl TokenBucketConfig {
    pub fn new(capacity: f64, refill_rate: f64, initial_tokens: f64) -> Self {
        TokenBucketConfig {
            capacity,
            refill_rate,
            initial_tokens: initial_tokens.min(capacity),
        }
    }
}

struct State {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucket {
    config: TokenBucketConfig,
    state: Mutex<State>,
    source: String,
}

impl TokenBucket {
    pub fn new(source: impl Into<String>, config: TokenBucketConfig) -> Self {
        TokenBucket {
            config,
            state: Mutex::new(State {
                tokens: config.initial_tokens,
                last_refill: Instant::now(),
            }),
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attempt to acquire a single token. Non-blocking.
    pub fn allow(&self) -> bool {
        self.allow_n(1.0)
    }

    /// Attempt to acquire `n` tokens atomically: either all `n` are
    /// deducted or none are.
    pub fn allow_n(&self, n: f64) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill_locked(&mut state);
        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }

    fn refill_locked(&self, state: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.config.refill_rate).min(self.config.capacity);
            state.last_refill = now;
        }
    }

    /// Deficit in tokens needed for `n` to become available, given the
    /// current (already-refilled) balance. Zero if `n` is already available.
    fn deficit_locked(&self, state: &State, n: f64) -> f64 {
        (n - state.tokens).max(0.0)
    }

    pub fn wait(&self, cancel: &CancellationToken) -> RestoreResult<()> {
        self.wait_n(1.0, cancel)
    }

    pub fn wait_n(&self, n: f64, cancel: &CancellationToken) -> RestoreResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(RestoreError::Cancelled {
                    reason: cancel
                        .reason()
                        .unwrap_or_else(|| "cancelled while waiting for rate limit".into()),
                });
            }
            if self.allow_n(n) {
                return Ok(());
            }
            let sleep_for = {
                let mut state = self.state.lock().unwrap();
                self.refill_locked(&mut state);
                let deficit = self.deficit_locked(&state, n);
                Duration::from_secs_f64((deficit / self.config.refill_rate).max(0.0))
            };
            // Sleep in short slices so cancellation is observed promptly.
            let slice = sleep_for.min(Duration::from_millis(50)).max(Duration::from_millis(1));
            std::thread::sleep(slice);
        }
    }
}
