//! The candidate x strategy fallback chain.
//!
//! Candidates are walked in resolver order. Each one is filtered first;
//! survivors get every [`Strategy`] in order until one produces a verified
//! effect. Strategy errors are recorded and absorbed, never propagated.

use crate::driver::{BrowsingContext, DriverError, Element, Resolver};
use crate::strategy::Strategy;
use crate::target::Target;
use crate::verify::{EffectKind, Observation, Verifier};
use crate::EngineConfig;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Longest text kept in diagnostics.
const MAX_DIAG_TEXT: usize = 60;

/// Why a full chain pass produced no verified effect.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainFailure {
    #[error("element not found: no candidates resolved")]
    NoCandidates,

    #[error("element not actionable: all {0} candidates filtered out")]
    AllFiltered(usize),

    #[error("resolve failed: {0}")]
    Resolve(DriverError),

    #[error("{strategy} failed: {message}")]
    Strategy { strategy: Strategy, message: String },

    #[error("no effect observed after {strategy}: expected {effect}")]
    NoEffect {
        strategy: Strategy,
        effect: &'static str,
    },

    #[error("deadline exceeded before {0}")]
    Deadline(&'static str),
}

/// Identifying attributes of a candidate. Logged, never used for control flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub href: Option<String>,
    pub text: String,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.text)?;
        if let Some(ref href) = self.href {
            write!(f, " href={}", href)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The expected effect was observed.
    Verified,
    /// The strategy ran but nothing observable changed.
    NoEffect,
    /// The strategy raised.
    Failed(String),
    /// The caller's deadline ran out during the attempt.
    Deadline,
}

impl AttemptOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::NoEffect => "no-effect",
            Self::Failed(_) => "failed",
            Self::Deadline => "deadline",
        }
    }

    /// The chain-level failure this outcome stands for; `None` when verified.
    fn as_failure(&self, strategy: Strategy, effect: &EffectKind) -> Option<ChainFailure> {
        match self {
            Self::Verified => None,
            Self::NoEffect => Some(ChainFailure::NoEffect {
                strategy,
                effect: effect.name(),
            }),
            Self::Failed(message) => Some(ChainFailure::Strategy {
                strategy,
                message: message.clone(),
            }),
            Self::Deadline => Some(ChainFailure::Deadline(strategy.name())),
        }
    }
}

/// One strategy attempt on one candidate.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub pass: u8,
    pub candidate: usize,
    pub strategy: Strategy,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
    pub pre: Observation,
    pub post: Observation,
    pub diagnostics: Diagnostics,
}

/// Result of one full pass over the candidate x strategy matrix.
#[derive(Debug)]
pub enum ChainOutcome {
    Verified {
        candidate: usize,
        strategy: Strategy,
        attempts: Vec<AttemptRecord>,
    },
    Exhausted {
        failure: ChainFailure,
        attempts: Vec<AttemptRecord>,
    },
}

impl ChainOutcome {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Verified { attempts, .. } | Self::Exhausted { attempts, .. } => attempts,
        }
    }
}

pub struct ActionChain<'a, R, B> {
    resolver: &'a R,
    verifier: Verifier<'a, R, B>,
    ctx: &'a B,
    config: &'a EngineConfig,
}

impl<'a, R: Resolver, B: BrowsingContext> ActionChain<'a, R, B> {
    pub fn new(resolver: &'a R, ctx: &'a B, config: &'a EngineConfig) -> Self {
        Self {
            resolver,
            verifier: Verifier::new(
                resolver,
                ctx,
                config.verify_timeout(),
                config.poll_interval(),
            ),
            ctx,
            config,
        }
    }

    /// Candidates for `target`, in resolver order.
    pub async fn resolve_candidates(
        &self,
        target: &Target,
        deadline: Instant,
    ) -> Result<Vec<R::Handle>, ChainFailure> {
        bounded(deadline, "resolve", self.resolver.resolve(target))
            .await?
            .map_err(ChainFailure::Resolve)
    }

    /// One full pass. Stops at the first verified effect.
    pub async fn run(
        &self,
        target: &Target,
        effect: &EffectKind,
        deadline: Instant,
        pass: u8,
    ) -> ChainOutcome {
        let mut attempts = Vec::new();

        let candidates = match self.resolve_candidates(target, deadline).await {
            Ok(c) if c.is_empty() => {
                return ChainOutcome::Exhausted {
                    failure: ChainFailure::NoCandidates,
                    attempts,
                }
            }
            Ok(c) => c,
            Err(failure) => return ChainOutcome::Exhausted { failure, attempts },
        };
        debug!("{} candidate(s) for {}", candidates.len(), target);

        let mut last_failure = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let diagnostics = match self.admit(target, candidate, deadline).await {
                Ok(Ok(d)) => d,
                Ok(Err(reason)) => {
                    debug!(candidate = index, "skipped: {}", reason);
                    continue;
                }
                Err(failure) => {
                    debug!(candidate = index, "{}", failure);
                    last_failure = Some(failure);
                    break;
                }
            };

            for strategy in Strategy::ORDER {
                let mut record = self.attempt(candidate, strategy, effect, deadline).await;
                record.pass = pass;
                record.candidate = index;
                record.diagnostics = diagnostics.clone();
                info!(
                    pass,
                    candidate = index,
                    strategy = strategy.name(),
                    outcome = record.outcome.name(),
                    elapsed_ms = record.elapsed.as_millis() as u64,
                    element = %record.diagnostics,
                    "attempt on {}",
                    target
                );

                match record.outcome.as_failure(strategy, effect) {
                    None => {
                        attempts.push(record);
                        return ChainOutcome::Verified {
                            candidate: index,
                            strategy,
                            attempts,
                        };
                    }
                    Some(failure) => {
                        last_failure = Some(failure);
                        attempts.push(record);
                    }
                }
            }
        }

        let failure = last_failure.unwrap_or(ChainFailure::AllFiltered(candidates.len()));
        ChainOutcome::Exhausted { failure, attempts }
    }

    /// Visibility, enablement, box and attribute filter.
    /// The inner `Err` carries the skip reason; the outer one a deadline.
    async fn admit(
        &self,
        target: &Target,
        candidate: &R::Handle,
        deadline: Instant,
    ) -> Result<Result<Diagnostics, String>, ChainFailure> {
        let check = async {
            if !candidate.is_visible().await.map_err(|e| e.to_string())? {
                return Err("not visible".to_string());
            }
            if !candidate.is_enabled().await.map_err(|e| e.to_string())? {
                return Err("disabled".to_string());
            }
            match candidate.bounding_box().await.map_err(|e| e.to_string())? {
                Some(b) if !b.is_degenerate() => {}
                _ => return Err("degenerate bounding box".to_string()),
            }
            if let Some(name) = target.required_attribute() {
                let value = candidate.attribute(name).await.map_err(|e| e.to_string())?;
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    return Err(format!("missing '{}'", name));
                }
            }

            let text = candidate.text_content().await.unwrap_or_default();
            if let Some(re) = target.text_hint() {
                if !re.is_match(&text) {
                    return Err(format!("text does not match /{}/", re.as_str()));
                }
            }
            let href = candidate.attribute("href").await.ok().flatten();
            Ok(Diagnostics {
                href,
                text: truncate(text.trim(), MAX_DIAG_TEXT),
            })
        };
        bounded(deadline, "filter", check).await
    }

    async fn attempt(
        &self,
        candidate: &R::Handle,
        strategy: Strategy,
        effect: &EffectKind,
        deadline: Instant,
    ) -> AttemptRecord {
        let started = Instant::now();
        let record = |outcome, pre, post| AttemptRecord {
            pass: 0,
            candidate: 0,
            strategy,
            outcome,
            elapsed: started.elapsed(),
            pre,
            post,
            diagnostics: Diagnostics::default(),
        };

        if remaining(deadline).is_zero() {
            return record(AttemptOutcome::Deadline, Observation::default(), Observation::default());
        }
        let pre = match bounded(deadline, "capture", self.verifier.capture(effect)).await {
            Ok(pre) => pre,
            Err(_) => {
                return record(AttemptOutcome::Deadline, Observation::default(), Observation::default())
            }
        };

        let invoked = bounded(
            deadline,
            strategy.name(),
            strategy.invoke(self.resolver, candidate, self.config.native_click_timeout()),
        )
        .await;
        match invoked {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return record(AttemptOutcome::Failed(e.to_string()), pre, Observation::default()),
            Err(_) => return record(AttemptOutcome::Deadline, pre, Observation::default()),
        }

        let settle = self.config.settle().min(remaining(deadline));
        if !settle.is_zero() {
            self.ctx.settle(settle).await;
        }

        // A read that is ready at the deadline still counts.
        let (observed, post) = match tokio::time::timeout_at(
            deadline,
            self.verifier.verify(&pre, effect, deadline),
        )
        .await
        {
            Ok(verified) => verified,
            Err(_) => return record(AttemptOutcome::Deadline, pre, Observation::default()),
        };
        let outcome = if observed {
            AttemptOutcome::Verified
        } else {
            AttemptOutcome::NoEffect
        };
        record(outcome, pre, post)
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Run `fut` unless the deadline has already passed, and no longer than it allows.
async fn bounded<F: Future>(
    deadline: Instant,
    stage: &'static str,
    fut: F,
) -> Result<F::Output, ChainFailure> {
    if remaining(deadline).is_zero() {
        return Err(ChainFailure::Deadline(stage));
    }
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| ChainFailure::Deadline(stage))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
