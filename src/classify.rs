//! Maps a terminal failure to a category and recovery hints.
//!
//! Rules are phrase lists checked in order against the lowercased error
//! text; the first rule with a matching phrase wins. Anything unmatched is
//! `system` with `[log]`, so classification never fails.

use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Element,
    Timing,
    Content,
    System,
}

impl ErrorCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Element => "element",
            Self::Timing => "timing",
            Self::Content => "content",
            Self::System => "system",
        }
    }

    /// Ordered recovery hints for this category.
    pub fn recovery(&self) -> &'static [Recovery] {
        match self {
            Self::Network => &[Recovery::Retry, Recovery::Reload],
            Self::Element => &[Recovery::Log],
            Self::Timing => &[Recovery::Retry],
            Self::Content => &[Recovery::Reload, Recovery::Retry],
            Self::System => &[Recovery::Log],
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Advisory action the orchestrator may take before its single retry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-run the chain as is.
    Retry,
    /// Refresh the document, then re-run the chain.
    Reload,
    /// Record only.
    Log,
}

impl Recovery {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Reload => "reload",
            Self::Log => "log",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub recovery: Vec<Recovery>,
}

impl Classification {
    fn of(category: ErrorCategory) -> Self {
        Self {
            category,
            recovery: category.recovery().to_vec(),
        }
    }

    /// A second chain pass is only worth it if a hint asks for one.
    pub fn permits_retry(&self) -> bool {
        self.recovery
            .iter()
            .any(|r| matches!(r, Recovery::Retry | Recovery::Reload))
    }

    pub fn wants_reload(&self) -> bool {
        self.recovery.contains(&Recovery::Reload)
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub category: ErrorCategory,
    pub phrases: Vec<String>,
}

impl Rule {
    pub fn new<I, S>(category: ErrorCategory, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category,
            phrases: phrases
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.phrases.iter().any(|p| haystack.contains(p.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            rules: vec![
                Rule::new(
                    ErrorCategory::Network,
                    [
                        "timed out",
                        "timeout",
                        "net::err",
                        "connection",
                        "network",
                        "disconnected",
                        "socket",
                        "websocket",
                    ],
                ),
                Rule::new(
                    ErrorCategory::Element,
                    [
                        "not found",
                        "no such element",
                        "stale",
                        "detached",
                        "not attached",
                        "not actionable",
                        "not visible",
                        "not interactable",
                    ],
                ),
                Rule::new(
                    ErrorCategory::Timing,
                    [
                        "deadline exceeded",
                        "no effect observed",
                        "not ready",
                        "still loading",
                    ],
                ),
                Rule::new(
                    ErrorCategory::Content,
                    [
                        "unexpected page",
                        "unexpected content",
                        "session expired",
                        "parse error",
                        "malformed",
                    ],
                ),
            ],
        }
    }
}

impl Classifier {
    /// A classifier with no rules; everything is `system`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(Rule::new(rule.category, rule.phrases));
        self
    }

    pub fn classify(&self, error: &dyn std::error::Error) -> Classification {
        self.classify_message(&error.to_string())
    }

    pub fn classify_message(&self, message: &str) -> Classification {
        let haystack = message.to_lowercase();
        let category = self
            .rules
            .iter()
            .find(|rule| rule.matches(&haystack))
            .map(|rule| rule.category)
            .unwrap_or(ErrorCategory::System);
        Classification::of(category)
    }
}
