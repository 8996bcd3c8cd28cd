//! Run-scoped breaker registry.
//!
//! Owned by the executor context and passed where needed; there is no
//! process-wide instance. Each run gets its own breaker, created on first
//! use and dropped when the run ends.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::breaker::CircuitBreaker;
use super::stats::CircuitStats;
use crate::clock::{Clock, SystemClock};
use crate::config::{CircuitBreakerConfig, ConfigResult};

/// Shared reference to a run's breaker
pub type SharedCircuitBreaker = Arc<CircuitBreaker>;

/// Breakers keyed by run id.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    breakers: RwLock<HashMap<String, SharedCircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Registry handing out breakers built from `config`, or from the
    /// defaults when `config` is out of range.
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config.validated_or_default(), clock)
    }

    pub fn try_new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::try_with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`BreakerRegistry::with_clock`], but fails on an out-of-range config.
    pub fn try_with_clock(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Breaker for `run_id`, creating it at run start.
    pub fn get_or_create(&self, run_id: &str) -> SharedCircuitBreaker {
        if let Some(existing) = self.get(run_id) {
            return existing;
        }
        let mut breakers = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(run_id.to_string())
            .or_insert_with(|| {
                debug!(run_id, "Creating circuit breaker for run");
                Arc::new(
                    CircuitBreaker::with_clock(self.config.clone(), self.clock.clone())
                        .named(run_id),
                )
            })
            .clone()
    }

    pub fn get(&self, run_id: &str) -> Option<SharedCircuitBreaker> {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run_id)
            .cloned()
    }

    /// Drop a finished run's breaker.
    pub fn remove(&self, run_id: &str) -> Option<SharedCircuitBreaker> {
        let removed = self
            .breakers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(run_id);
        if let Some(cb) = &removed {
            info!(run_id, final_stats = %cb.get_stats(), "Circuit breaker retired");
        }
        removed
    }

    /// Known run ids, sorted.
    pub fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stats for every run, keyed by run id.
    pub fn snapshot(&self) -> BTreeMap<String, CircuitStats> {
        let breakers: Vec<(String, SharedCircuitBreaker)> = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, cb)| (id.clone(), cb.clone()))
            .collect();
        breakers
            .into_iter()
            .map(|(id, cb)| (id, cb.get_stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitState;
    use crate::clock::ManualClock;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::with_clock(
            CircuitBreakerConfig {
                failure_threshold: 2,
                ..Default::default()
            },
            Arc::new(ManualClock::new()),
        )
    }

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let reg = registry();
        let a = reg.get_or_create("run-1");
        let b = reg.get_or_create("run-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.label(), "run-1");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_runs_are_isolated() {
        let reg = registry();
        let a = reg.get_or_create("run-a");
        let b = reg.get_or_create("run-b");
        a.record_failure();
        a.record_failure();
        assert_eq!(a.state(), CircuitState::Open);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_remove_and_recreate_starts_fresh() {
        let reg = registry();
        let a = reg.get_or_create("run-1");
        a.record_failure();
        a.record_failure();
        assert!(reg.remove("run-1").is_some());
        assert!(reg.get("run-1").is_none());
        assert!(reg.is_empty());

        let fresh = reg.get_or_create("run-1");
        assert_eq!(fresh.get_stats().total_trips, 0);
    }

    #[test]
    fn test_snapshot_and_ids_sorted() {
        let reg = registry();
        reg.get_or_create("run-b");
        reg.get_or_create("run-a");
        assert_eq!(reg.run_ids(), vec!["run-a", "run-b"]);
        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["run-a"].label, "run-a");
    }

    #[test]
    fn test_out_of_range_config_rejected_or_replaced() {
        let bad = CircuitBreakerConfig {
            half_open_max_calls: 0,
            health_threshold: f64::NAN,
            ..Default::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        assert!(BreakerRegistry::try_with_clock(bad.clone(), clock.clone()).is_err());

        let reg = BreakerRegistry::with_clock(bad, clock);
        let cb = reg.get_or_create("run-1");
        assert_eq!(cb.config(), &CircuitBreakerConfig::default());
    }
}
