//! Post-action effect verification.
//!
//! A missing effect is not an error: it only tells the chain that the
//! strategy did not work.

use crate::driver::{BrowsingContext, Element, Resolver};
use crate::target::Target;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// The observable change a successful action must produce.
#[derive(Debug, Clone)]
pub enum EffectKind {
    /// The location identifier differs from the one captured before the attempt.
    LocationChanged,
    /// A marker element becomes visible (overlays, in-page panels).
    ElementAppeared(Target),
    /// The number of open pages/tabs grows.
    NewPageOpened,
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocationChanged => "location-changed",
            Self::ElementAppeared(_) => "element-appeared",
            Self::NewPageOpened => "new-page-opened",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the verifier saw. Only the field relevant to the effect kind is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub location: Option<String>,
    pub page_count: Option<usize>,
    pub marker_visible: Option<bool>,
}

pub struct Verifier<'a, R, B> {
    resolver: &'a R,
    ctx: &'a B,
    verify_timeout: Duration,
    poll_interval: Duration,
}

impl<'a, R: Resolver, B: BrowsingContext> Verifier<'a, R, B> {
    pub fn new(resolver: &'a R, ctx: &'a B, verify_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            resolver,
            ctx,
            verify_timeout,
            poll_interval,
        }
    }

    /// Capture the state `effect` will be compared against.
    /// Errors are folded into an empty observation.
    pub async fn capture(&self, effect: &EffectKind) -> Observation {
        match effect {
            EffectKind::LocationChanged => Observation {
                location: self.ctx.location().await.ok(),
                ..Default::default()
            },
            EffectKind::NewPageOpened => Observation {
                page_count: self.ctx.page_count().await.ok(),
                ..Default::default()
            },
            EffectKind::ElementAppeared(marker) => Observation {
                marker_visible: Some(self.marker_visible(marker).await),
                ..Default::default()
            },
        }
    }

    /// Check `effect` against `pre`. Returns whether it was observed and the
    /// post-attempt observation. Never waits past `deadline`.
    pub async fn verify(
        &self,
        pre: &Observation,
        effect: &EffectKind,
        deadline: Instant,
    ) -> (bool, Observation) {
        match effect {
            EffectKind::LocationChanged => {
                let post = self.capture(effect).await;
                let changed = match (&pre.location, &post.location) {
                    (Some(before), Some(after)) => before != after,
                    // An unreadable location is not evidence of navigation.
                    _ => false,
                };
                (changed, post)
            }
            EffectKind::NewPageOpened => {
                let post = self.capture(effect).await;
                let opened = matches!(
                    (pre.page_count, post.page_count),
                    (Some(before), Some(after)) if after > before
                );
                (opened, post)
            }
            EffectKind::ElementAppeared(marker) => {
                // Only a hidden -> visible transition counts.
                if pre.marker_visible != Some(false) {
                    debug!("marker {} was not hidden before the attempt", marker);
                    return (
                        false,
                        Observation {
                            marker_visible: pre.marker_visible,
                            ..Default::default()
                        },
                    );
                }
                let until = deadline.min(Instant::now() + self.verify_timeout);
                let max_polls = self.verify_timeout.as_millis() / self.poll_interval.as_millis().max(1) + 1;
                for _ in 0..max_polls {
                    let visible = tokio::time::timeout_at(until, self.marker_visible(marker))
                        .await
                        .unwrap_or(false);
                    if visible {
                        return (
                            true,
                            Observation {
                                marker_visible: Some(true),
                                ..Default::default()
                            },
                        );
                    }
                    let now = Instant::now();
                    if now >= until {
                        break;
                    }
                    self.ctx.settle(self.poll_interval.min(until - now)).await;
                }
                (
                    false,
                    Observation {
                        marker_visible: Some(false),
                        ..Default::default()
                    },
                )
            }
        }
    }

    async fn marker_visible(&self, marker: &Target) -> bool {
        let handles = match self.resolver.resolve(marker).await {
            Ok(handles) => handles,
            Err(e) => {
                debug!("marker {} unresolved: {}", marker, e);
                return false;
            }
        };
        for handle in &handles {
            if handle.is_visible().await.unwrap_or(false) {
                return true;
            }
        }
        false
    }
}
