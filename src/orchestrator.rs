//! Breaker gate, chain passes, classification and the single bounded retry.

use crate::breaker::CircuitBreaker;
use crate::chain::{ActionChain, AttemptRecord, ChainOutcome};
use crate::classify::{Classification, Classifier, ErrorCategory};
use crate::driver::{BrowsingContext, Resolver};
use crate::strategy::Strategy;
use crate::target::Target;
use crate::verify::EffectKind;
use crate::{EngineConfig, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Full passes over the candidate x strategy matrix per logical action.
const MAX_PASSES: u8 = 2;

/// Stand-in for deadlines too large to add to the clock.
const UNBOUNDED_DEADLINE: Duration = Duration::from_secs(86_400 * 365);

/// Why an action was reported as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The breaker rejected the call; nothing was attempted.
    CircuitOpen,
    /// Every pass was exhausted.
    Classified(ErrorCategory),
}

impl FailureCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CircuitOpen => "circuit-open",
            Self::Classified(c) => c.name(),
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of [`Orchestrator::perform_action`].
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    /// Strategy whose effect was verified.
    pub strategy_used: Option<Strategy>,
    /// Candidate index the verified strategy ran on.
    pub candidate: Option<usize>,
    pub category: Option<FailureCategory>,
    /// Last diagnostic detail on failure.
    pub detail: Option<String>,
    pub attempts: Vec<AttemptRecord>,
    /// Chain passes run (0 when the circuit was open).
    pub passes: u8,
    pub elapsed: Duration,
}

impl ActionOutcome {
    fn circuit_open() -> Self {
        Self {
            success: false,
            strategy_used: None,
            candidate: None,
            category: Some(FailureCategory::CircuitOpen),
            detail: Some("circuit breaker is open".into()),
            attempts: Vec::new(),
            passes: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Performs logical actions against one browsing context.
///
/// Owns one [`CircuitBreaker`] unless the host shares one across
/// orchestrators with [`Orchestrator::with_breaker`].
pub struct Orchestrator<R, B> {
    resolver: R,
    ctx: B,
    config: EngineConfig,
    classifier: Classifier,
    breaker: Arc<CircuitBreaker>,
}

impl<R: Resolver, B: BrowsingContext> Orchestrator<R, B> {
    pub fn new(resolver: R, ctx: B, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        Ok(Self {
            resolver,
            ctx,
            config,
            classifier: Classifier::default(),
            breaker,
        })
    }

    /// Use a breaker shared with other orchestrators (or built on a test clock).
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn context(&self) -> &B {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Perform one logical action and wait for `effect`, all within `deadline`.
    ///
    /// Only a misconfigured target is an `Err`; everything the page does
    /// wrong ends up in the returned [`ActionOutcome`].
    #[instrument(level = "debug", skip_all, fields(target = %target, effect = %effect))]
    pub async fn perform_action(
        &self,
        target: &Target,
        effect: &EffectKind,
        deadline: Duration,
    ) -> Result<ActionOutcome> {
        target.validate()?;
        if let EffectKind::ElementAppeared(marker) = effect {
            marker.validate()?;
        }

        if !self.breaker.allow() {
            warn!("circuit open, skipping {}", target);
            return Ok(ActionOutcome::circuit_open());
        }

        let started = Instant::now();
        let deadline_at = started
            .checked_add(deadline)
            .unwrap_or_else(|| started + UNBOUNDED_DEADLINE);
        let chain = ActionChain::new(&self.resolver, &self.ctx, &self.config);
        let mut attempts = Vec::new();
        let mut pass = 0;

        let (classification, detail) = loop {
            pass += 1;
            match chain.run(target, effect, deadline_at, pass).await {
                ChainOutcome::Verified {
                    candidate,
                    strategy,
                    attempts: mut records,
                } => {
                    attempts.append(&mut records);
                    self.breaker.record_success();
                    info!(
                        success = true,
                        strategy = strategy.name(),
                        candidate,
                        attempts = attempts.len(),
                        passes = pass,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "action on {} verified",
                        target
                    );
                    return Ok(ActionOutcome {
                        success: true,
                        strategy_used: Some(strategy),
                        candidate: Some(candidate),
                        category: None,
                        detail: None,
                        attempts,
                        passes: pass,
                        elapsed: started.elapsed(),
                    });
                }
                ChainOutcome::Exhausted {
                    failure,
                    attempts: mut records,
                } => {
                    attempts.append(&mut records);
                    let classification = self.classifier.classify(&failure);
                    let detail = failure.to_string();
                    if pass >= MAX_PASSES || !classification.permits_retry() {
                        break (classification, detail);
                    }
                    self.recover(&classification, &detail, deadline_at).await;
                }
            }
        };

        self.breaker.record_failure();
        warn!(
            success = false,
            category = classification.category.name(),
            attempts = attempts.len(),
            passes = pass,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "action on {} exhausted: {}",
            target,
            detail
        );
        Ok(ActionOutcome {
            success: false,
            strategy_used: None,
            candidate: None,
            category: Some(FailureCategory::Classified(classification.category)),
            detail: Some(detail),
            attempts,
            passes: pass,
            elapsed: started.elapsed(),
        })
    }

    /// Run the corrective part of the recovery hints before the retry pass.
    async fn recover(&self, classification: &Classification, detail: &str, deadline: Instant) {
        let hints: Vec<&str> = classification.recovery.iter().map(|r| r.name()).collect();
        info!(
            category = classification.category.name(),
            recovery = ?hints,
            "retrying after: {}",
            detail
        );
        if !classification.wants_reload() {
            return;
        }
        match tokio::time::timeout_at(deadline, self.ctx.reload()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("reload before retry failed: {}", e),
            Err(_) => warn!("reload before retry hit the deadline"),
        }
    }
}
