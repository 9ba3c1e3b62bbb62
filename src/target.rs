//! Logical targets - what to act upon, not how to find it.

use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::fmt;

/// Role used by `text:` shorthand: anything a user could plausibly click.
pub const INTERACTIVE: &str =
    "a, button, input, select, textarea, [role=\"button\"], [role=\"link\"], [onclick]";

/// A logical description of the element an action is aimed at.
///
/// The resolver receives the whole target; the engine itself only uses
/// `text_hint` and `required_attribute` to filter what comes back.
#[derive(Debug, Clone)]
pub struct Target {
    role: String,
    index: Option<usize>,
    text_hint: Option<Regex>,
    scope: Option<String>,
    required_attribute: Option<String>,
}

impl Target {
    /// Target elements of the given role (a selector in browser-backed hosts).
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            index: None,
            text_hint: None,
            scope: None,
            required_attribute: None,
        }
    }

    /// Parse shorthand: `css:<selector>`, `role:<selector>` or `text:<pattern>`.
    /// Unprefixed strings are treated as a role.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(v) = s.strip_prefix("css:").or_else(|| s.strip_prefix("role:")) {
            return Ok(Self::new(v.trim()));
        }
        if let Some(v) = s.strip_prefix("text:") {
            return Self::new(INTERACTIVE).with_text_hint(&regex::escape(v.trim()));
        }
        Ok(Self::new(s))
    }

    /// Restrict resolution to containers matching `scope`.
    pub fn within(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Only the `index`th (zero-based) scope container.
    pub fn nth(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Keep only candidates whose text content matches `pattern`.
    pub fn with_text_hint(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::InvalidTarget(format!("bad text hint '{}': {}", pattern, e)))?;
        self.text_hint = Some(re);
        Ok(self)
    }

    /// Require a non-blank attribute (e.g. `href`) before a candidate is attempted.
    pub fn require_attribute(mut self, name: impl Into<String>) -> Self {
        self.required_attribute = Some(name.into());
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn text_hint(&self) -> Option<&Regex> {
        self.text_hint.as_ref()
    }

    pub fn required_attribute(&self) -> Option<&str> {
        self.required_attribute.as_deref()
    }

    /// Reject targets no resolver could make sense of.
    pub fn validate(&self) -> Result<()> {
        if self.role.trim().is_empty() {
            return Err(Error::InvalidTarget("role must not be empty".into()));
        }
        if matches!(self.scope.as_deref(), Some(s) if s.trim().is_empty()) {
            return Err(Error::InvalidTarget("scope must not be blank".into()));
        }
        if matches!(self.required_attribute.as_deref(), Some(a) if a.trim().is_empty()) {
            return Err(Error::InvalidTarget(
                "required attribute name must not be blank".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.role)?;
        if let Some(ref scope) = self.scope {
            write!(f, " in '{}'", scope)?;
        }
        if let Some(i) = self.index {
            write!(f, " #{}", i)?;
        }
        if let Some(ref re) = self.text_hint {
            write!(f, " ~/{}/", re.as_str())?;
        }
        Ok(())
    }
}

/// Element rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Zero-area, negative or non-finite boxes cannot be clicked.
    pub fn is_degenerate(&self) -> bool {
        let finite = self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite();
        !finite || self.width <= 0.0 || self.height <= 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}
