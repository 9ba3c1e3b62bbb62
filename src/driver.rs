//! Boundary traits implemented by the host's browser layer.

use crate::target::{BoundingBox, Target};
use async_trait::async_trait;
use std::time::Duration;

/// Errors raised by the host's browser layer.
///
/// Display strings are what the classifier matches on, so each variant
/// leads with the phrase describing its failure shape.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("stale element: {0}")]
    Stale(String),

    #[error("element not found: {0}")]
    NotFound(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("{0}")]
    Other(String),
}

/// An opaque handle to a live element.
#[async_trait]
pub trait Element: Send + Sync {
    async fn is_visible(&self) -> Result<bool, DriverError>;

    async fn is_enabled(&self) -> Result<bool, DriverError>;

    /// `None` when the element has no layout box.
    async fn bounding_box(&self) -> Result<Option<BoundingBox>, DriverError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;

    async fn text_content(&self) -> Result<String, DriverError>;

    async fn scroll_into_view(&self) -> Result<(), DriverError>;

    /// Native interaction through the browser's input pipeline.
    async fn click(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Evaluate a function expression with the element as its only argument,
    /// e.g. `(el) => el.click()`.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;
}

/// Turns a [`Target`] into candidate handles.
#[async_trait]
pub trait Resolver: Send + Sync {
    type Handle: Element;

    /// Candidates in document order within the target's scope.
    async fn resolve(&self, target: &Target) -> Result<Vec<Self::Handle>, DriverError>;

    /// Mouse click at viewport coordinates.
    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError>;
}

/// The page/tab the engine operates in.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// Identifier of the current location (the URL in browser hosts).
    async fn location(&self) -> Result<String, DriverError>;

    /// Number of open pages/tabs in the browsing context.
    async fn page_count(&self) -> Result<usize, DriverError>;

    /// Suspend for `duration`.
    async fn settle(&self, duration: Duration);

    /// Refresh the whole document.
    async fn reload(&self) -> Result<(), DriverError>;
}
