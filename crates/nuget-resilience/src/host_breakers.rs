//! Lazily-populated per-host circuit breaker map, isolating failures on
//! one registry host from calls to every other host (spec §4.5, §9).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

pub struct HostBreakers {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl HostBreakers {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        HostBreakers {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn breaker_for(&self, host: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().unwrap().get(host) {
            return Arc::clone(existing);
        }
        let mut breakers = self.breakers.write().unwrap();
        if let Some(existing) = breakers.get(host) {
            return Arc::clone(existing);
        }
        let breaker = Arc::new(CircuitBreaker::new(host, self.config));
        breakers.insert(host.to_string(), Arc::clone(&breaker));
        breaker
    }

    pub fn reset(&self) {
        self.breakers.write().unwrap().clear();
    }
}
