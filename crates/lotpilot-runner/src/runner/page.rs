//! lotpilot's browser traits over an eoka page.
//!
//! Element handles are CSS paths computed at resolve time. Every element
//! operation re-queries its path, so a handle whose node went away reports
//! a stale element instead of acting on something else.

use async_trait::async_trait;
use eoka::{Browser, Page};
use lotpilot::{BoundingBox, BrowsingContext, DriverError, Element, Resolver, Target};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Collect `role` matches inside `scope` containers, in document order.
const RESOLVE_JS: &str = r#"
((role, scope, index) => {
    function path(el) {
        if (el.id) return '#' + CSS.escape(el.id);
        const parts = [];
        let n = el;
        while (n && n.nodeType === 1) {
            let s = n.tagName.toLowerCase();
            if (n.id) { parts.unshift('#' + CSS.escape(n.id)); break; }
            const p = n.parentElement;
            if (p) {
                const sibs = [...p.children].filter(c => c.tagName === n.tagName);
                if (sibs.length > 1) s += ':nth-of-type(' + (sibs.indexOf(n) + 1) + ')';
            }
            parts.unshift(s);
            n = p;
        }
        return parts.join(' > ');
    }

    let containers = scope ? [...document.querySelectorAll(scope)] : [document];
    if (index !== null) containers = containers.slice(index, index + 1);

    const seen = new Set();
    const out = [];
    for (const c of containers) {
        for (const el of c.querySelectorAll(role)) {
            if (seen.has(el)) continue;
            seen.add(el);
            out.push(path(el));
        }
    }
    return out;
})
"#;

/// Pointer and mouse events on whatever is painted at a viewport point.
const CLICK_AT_JS: &str = r#"
((x, y) => {
    const el = document.elementFromPoint(x, y);
    if (!el) return false;
    const o = { bubbles: true, cancelable: true, composed: true, clientX: x, clientY: y, view: window, button: 0 };
    el.dispatchEvent(new PointerEvent('pointerdown', o));
    el.dispatchEvent(new MouseEvent('mousedown', o));
    el.dispatchEvent(new PointerEvent('pointerup', o));
    el.dispatchEvent(new MouseEvent('mouseup', o));
    el.dispatchEvent(new MouseEvent('click', o));
    return true;
})
"#;

const VISIBLE_FN: &str = r#"(el) => {
    const r = el.getBoundingClientRect();
    const s = getComputedStyle(el);
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none' && s.opacity !== '0';
}"#;

const ENABLED_FN: &str = r#"(el) => !el.disabled && el.getAttribute('aria-disabled') !== 'true'"#;

const BBOX_FN: &str = r#"(el) => {
    if (el.getClientRects().length === 0) return null;
    const r = el.getBoundingClientRect();
    return { x: r.x, y: r.y, width: r.width, height: r.height };
}"#;

const TEXT_FN: &str = r#"(el) => (el.innerText || el.textContent || el.value || '').trim()"#;

const SCROLL_FN: &str = r#"(el) => { el.scrollIntoView({ block: 'center', inline: 'center' }); return true; }"#;

/// Map an eoka error onto the shapes the classifier knows.
fn driver_error(e: eoka::Error) -> DriverError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        DriverError::Timeout(msg)
    } else if lower.contains("websocket")
        || lower.contains("transport")
        || lower.contains("connection")
        || lower.contains("broken pipe")
        || lower.contains("reset by peer")
    {
        DriverError::Disconnected(msg)
    } else if lower.contains("not found") || lower.contains("no node") {
        DriverError::NotFound(msg)
    } else {
        DriverError::Script(msg)
    }
}

fn js_arg<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, DriverError> {
    serde_json::to_string(value).map_err(|e| DriverError::Other(e.to_string()))
}

/// One browser tab seen through lotpilot's traits.
#[derive(Clone, Copy)]
pub struct EokaPage<'a> {
    browser: &'a Browser,
    page: &'a Page,
}

impl<'a> EokaPage<'a> {
    pub fn new(browser: &'a Browser, page: &'a Page) -> Self {
        Self { browser, page }
    }

    pub fn page(&self) -> &'a Page {
        self.page
    }
}

#[async_trait]
impl<'a> Resolver for EokaPage<'a> {
    type Handle = EokaElement<'a>;

    async fn resolve(&self, target: &Target) -> Result<Vec<Self::Handle>, DriverError> {
        let js = format!(
            "{}({},{},{})",
            RESOLVE_JS,
            js_arg(target.role())?,
            js_arg(&target.scope())?,
            js_arg(&target.index())?,
        );
        let paths: Vec<String> = self.page.evaluate(&js).await.map_err(driver_error)?;
        debug!("{} resolved to {} element(s)", target, paths.len());
        Ok(paths
            .into_iter()
            .map(|selector| EokaElement {
                page: self.page,
                selector,
            })
            .collect())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError> {
        self.page
            .session()
            .dispatch_mouse_event(eoka::cdp::MouseEventType::MouseMoved, x, y, None, None)
            .await
            .map_err(driver_error)?;
        let js = format!("{}({},{})", CLICK_AT_JS, x, y);
        let hit: bool = self.page.evaluate(&js).await.map_err(driver_error)?;
        if !hit {
            return Err(DriverError::NotFound(format!("nothing painted at ({x}, {y})")));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowsingContext for EokaPage<'_> {
    async fn location(&self) -> Result<String, DriverError> {
        self.page.url().await.map_err(driver_error)
    }

    async fn page_count(&self) -> Result<usize, DriverError> {
        let tabs = self.browser.tabs().await.map_err(driver_error)?;
        Ok(tabs.len())
    }

    async fn settle(&self, duration: Duration) {
        self.page.wait(duration.as_millis() as u64).await;
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.page.reload().await.map_err(driver_error)
    }
}

/// An element addressed by its CSS path.
pub struct EokaElement<'a> {
    page: &'a Page,
    selector: String,
}

impl EokaElement<'_> {
    /// Run `func` with the element as its argument. A missing element is stale.
    ///
    /// The result comes back boxed in a one-element array so that a `null`
    /// result and a missing element stay distinguishable.
    async fn call<T: DeserializeOwned>(&self, func: &str) -> Result<T, DriverError> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); return el ? [({})(el)] : null; }})()",
            js_arg(&self.selector)?,
            func
        );
        let found: Option<(T,)> = self.page.evaluate(&js).await.map_err(driver_error)?;
        found
            .map(|(v,)| v)
            .ok_or_else(|| DriverError::Stale(format!("{} is no longer attached", self.selector)))
    }
}

#[async_trait]
impl Element for EokaElement<'_> {
    async fn is_visible(&self) -> Result<bool, DriverError> {
        self.call(VISIBLE_FN).await
    }

    async fn is_enabled(&self) -> Result<bool, DriverError> {
        self.call(ENABLED_FN).await
    }

    async fn bounding_box(&self) -> Result<Option<BoundingBox>, DriverError> {
        self.call(BBOX_FN).await
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        let func = format!("(el) => el.getAttribute({})", js_arg(name)?);
        self.call(&func).await
    }

    async fn text_content(&self) -> Result<String, DriverError> {
        self.call(TEXT_FN).await
    }

    async fn scroll_into_view(&self) -> Result<(), DriverError> {
        self.call::<bool>(SCROLL_FN).await.map(|_| ())
    }

    async fn click(&self, timeout: Duration) -> Result<(), DriverError> {
        match tokio::time::timeout(timeout, self.page.click(&self.selector)).await {
            Ok(result) => result.map_err(driver_error),
            Err(_) => Err(DriverError::Timeout(format!(
                "native click on {} after {}ms",
                self.selector,
                timeout.as_millis()
            ))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.call(script).await
    }
}
