//! Circuit breaker for phase attempts within a run.
//!
//! One [`CircuitBreaker`] per run halts runaway failure loops. The
//! [`BreakerRegistry`] hands out per-run breakers from the executor context.

pub mod breaker;
pub mod error;
pub mod registry;
pub mod stats;

pub use breaker::{CircuitBreaker, CircuitState};
pub use error::{CircuitCallError, CircuitOpenError, CircuitResult};
pub use registry::{BreakerRegistry, SharedCircuitBreaker};
pub use stats::CircuitStats;
