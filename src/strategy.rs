//! Interaction strategies, in preference order.

use crate::driver::{DriverError, Element, Resolver};
use std::fmt;
use std::time::Duration;

/// Dispatches a DOM click directly on the element, bypassing hit-testing
/// and the input pipeline.
const SCRIPTED_CLICK_JS: &str = r#"(el) => {
    if (!el || !el.isConnected) return false;
    el.click();
    return true;
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Scroll into view, then a native click with a bounded timeout.
    NativeInteraction,
    /// `element.click()` through script evaluation.
    ScriptedInvocation,
    /// Mouse click at the centre of the bounding box.
    CoordinateClick,
}

impl Strategy {
    /// Every strategy, most preferred first.
    pub const ORDER: [Strategy; 3] = [
        Strategy::NativeInteraction,
        Strategy::ScriptedInvocation,
        Strategy::CoordinateClick,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::NativeInteraction => "native-interaction",
            Self::ScriptedInvocation => "scripted-invocation",
            Self::CoordinateClick => "coordinate-click",
        }
    }

    /// Run this strategy once against `element`. Never retries.
    ///
    /// The native click is cut off after `click_timeout` even when the host
    /// ignores the timeout it is handed.
    pub(crate) async fn invoke<R: Resolver>(
        &self,
        resolver: &R,
        element: &R::Handle,
        click_timeout: Duration,
    ) -> Result<(), DriverError> {
        match self {
            Self::NativeInteraction => {
                let native = async {
                    element.scroll_into_view().await?;
                    element.click(click_timeout).await
                };
                match tokio::time::timeout(click_timeout, native).await {
                    Ok(result) => result,
                    Err(_) => Err(DriverError::Timeout(format!(
                        "native click gave no response in {}ms",
                        click_timeout.as_millis()
                    ))),
                }
            }
            Self::ScriptedInvocation => {
                let value = element.evaluate(SCRIPTED_CLICK_JS).await?;
                if value == serde_json::Value::Bool(false) {
                    return Err(DriverError::Stale("element detached before invocation".into()));
                }
                Ok(())
            }
            Self::CoordinateClick => {
                let bbox = element
                    .bounding_box()
                    .await?
                    .filter(|b| !b.is_degenerate())
                    .ok_or_else(|| DriverError::NotFound("element has no clickable box".into()))?;
                let (x, y) = bbox.center();
                resolver.click_at(x, y).await
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
