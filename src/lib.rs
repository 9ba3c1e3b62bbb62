//! # lotpilot
//!
//! Resilient interaction engine for legacy, script-heavy web portals whose
//! markup shifts between releases and whose clicks sometimes do nothing.
//!
//! A logical action ("open the 3rd vehicle row") is performed by walking an
//! ordered list of candidate elements and, per candidate, an ordered list of
//! interaction strategies. An attempt only counts once its effect has been
//! observed. Repeated exhaustion trips a circuit breaker.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lotpilot::{EffectKind, EngineConfig, Orchestrator, Target};
//! use std::time::Duration;
//!
//! # async fn run(resolver: impl lotpilot::Resolver, ctx: impl lotpilot::BrowsingContext) -> lotpilot::Result<()> {
//! let orchestrator = Orchestrator::new(resolver, ctx, EngineConfig::default())?;
//! let target = Target::new("td a")
//!     .within("table#inventory tbody tr")
//!     .nth(2)
//!     .require_attribute("href");
//!
//! let outcome = orchestrator
//!     .perform_action(&target, &EffectKind::LocationChanged, Duration::from_secs(30))
//!     .await?;
//! println!("success: {} via {:?}", outcome.success, outcome.strategy_used);
//! # Ok(())
//! # }
//! ```

mod breaker;
mod chain;
mod classify;
mod clock;
mod config;
mod driver;
mod orchestrator;
mod strategy;
mod target;
mod verify;

pub use breaker::{CircuitBreaker, CircuitState};
pub use chain::{ActionChain, AttemptOutcome, AttemptRecord, ChainFailure, ChainOutcome, Diagnostics};
pub use classify::{Classification, Classifier, ErrorCategory, Recovery, Rule};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerConfig, EngineConfig};
pub use driver::{BrowsingContext, DriverError, Element, Resolver};
pub use orchestrator::{ActionOutcome, FailureCategory, Orchestrator};
pub use strategy::Strategy;
pub use target::{BoundingBox, Target};
pub use verify::{EffectKind, Observation, Verifier};

/// Result type for lotpilot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures. Expected DOM instability never surfaces here; it is
/// reported through [`ActionOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("config error: {0}")]
    Config(String),
}
