//! In-memory page used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lotpilot::{BoundingBox, BrowsingContext, DriverError, Element, Resolver, Target};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Role the fake resolves to the marker element.
pub const MARKER_ROLE: &str = ".overlay";

/// What an interaction does to the page.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Returns normally but changes nothing.
    Noop,
    /// Changes the location.
    Navigate(String),
    /// Opens another page.
    OpenPage,
    /// Makes the marker visible.
    ShowMarker,
    Fail(DriverError),
    /// Never returns.
    Hang,
}

#[derive(Debug, Clone)]
pub struct Spec {
    pub visible: bool,
    pub enabled: bool,
    pub bbox: Option<BoundingBox>,
    pub href: Option<String>,
    pub text: String,
    /// The visibility check never returns.
    pub visibility_hangs: bool,
    pub native: Behavior,
    pub scripted: Behavior,
    pub coordinate: Behavior,
}

impl Spec {
    /// Visible, enabled, boxed element whose interactions all do nothing.
    pub fn inert(text: &str) -> Self {
        Self {
            visible: true,
            enabled: true,
            bbox: Some(BoundingBox::new(10.0, 10.0, 100.0, 20.0)),
            href: Some("/vehicle".into()),
            text: text.into(),
            visibility_hangs: false,
            native: Behavior::Noop,
            scripted: Behavior::Noop,
            coordinate: Behavior::Noop,
        }
    }

    pub fn hidden(text: &str) -> Self {
        Self {
            visible: false,
            ..Self::inert(text)
        }
    }

    pub fn all(text: &str, behavior: Behavior) -> Self {
        Self {
            native: behavior.clone(),
            scripted: behavior.clone(),
            coordinate: behavior,
            ..Self::inert(text)
        }
    }

    pub fn at(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

#[derive(Debug, Default)]
pub struct State {
    pub location: String,
    pub pages: usize,
    pub marker_visible: bool,
    pub reloads: usize,
    pub resolve_calls: usize,
    /// `(candidate, call)` in call order.
    pub calls: Vec<(usize, String)>,
    pub clicked_points: Vec<(f64, f64)>,
    pub location_reads: usize,
    /// Location reads past this many never return.
    pub location_stalls_after: Option<usize>,
}

#[derive(Clone)]
pub struct FakePage {
    specs: Arc<Vec<Spec>>,
    pub state: Arc<Mutex<State>>,
}

impl FakePage {
    pub fn new(specs: Vec<Spec>) -> Self {
        Self {
            specs: Arc::new(specs),
            state: Arc::new(Mutex::new(State {
                location: "https://portal.test/inventory".into(),
                pages: 1,
                ..Default::default()
            })),
        }
    }

    /// Stall every location read after the first `reads`.
    pub fn stall_location_after(self, reads: usize) -> Self {
        self.state.lock().location_stalls_after = Some(reads);
        self
    }

    pub fn show_marker(&self) {
        self.state.lock().marker_visible = true;
    }

    pub fn location(&self) -> String {
        self.state.lock().location.clone()
    }

    pub fn calls(&self) -> Vec<(usize, String)> {
        self.state.lock().calls.clone()
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().reloads
    }

    pub fn resolve_calls(&self) -> usize {
        self.state.lock().resolve_calls
    }

    async fn apply(&self, behavior: &Behavior) -> Result<(), DriverError> {
        match behavior {
            Behavior::Noop => Ok(()),
            Behavior::Navigate(to) => {
                self.state.lock().location = to.clone();
                Ok(())
            }
            Behavior::OpenPage => {
                self.state.lock().pages += 1;
                Ok(())
            }
            Behavior::ShowMarker => {
                self.state.lock().marker_visible = true;
                Ok(())
            }
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

pub struct FakeElement {
    index: usize,
    marker: bool,
    page: FakePage,
}

impl FakeElement {
    fn spec(&self) -> &Spec {
        &self.page.specs[self.index]
    }

    fn log(&self, call: &str) {
        self.page
            .state
            .lock()
            .calls
            .push((self.index, call.to_string()));
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn is_visible(&self) -> Result<bool, DriverError> {
        if self.marker {
            return Ok(self.page.state.lock().marker_visible);
        }
        if self.spec().visibility_hangs {
            std::future::pending::<()>().await;
        }
        Ok(self.spec().visible)
    }

    async fn is_enabled(&self) -> Result<bool, DriverError> {
        Ok(self.marker || self.spec().enabled)
    }

    async fn bounding_box(&self) -> Result<Option<BoundingBox>, DriverError> {
        Ok(self.spec().bbox)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        Ok(match name {
            "href" => self.spec().href.clone(),
            _ => None,
        })
    }

    async fn text_content(&self) -> Result<String, DriverError> {
        Ok(self.spec().text.clone())
    }

    async fn scroll_into_view(&self) -> Result<(), DriverError> {
        self.log("scroll");
        Ok(())
    }

    async fn click(&self, _timeout: Duration) -> Result<(), DriverError> {
        self.log("native");
        let behavior = self.spec().native.clone();
        self.page.apply(&behavior).await
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        self.log("scripted");
        let behavior = self.spec().scripted.clone();
        self.page.apply(&behavior).await?;
        Ok(serde_json::Value::Bool(true))
    }
}

#[async_trait]
impl Resolver for FakePage {
    type Handle = FakeElement;

    async fn resolve(&self, target: &Target) -> Result<Vec<FakeElement>, DriverError> {
        if target.role() == MARKER_ROLE {
            return Ok(vec![FakeElement {
                index: 0,
                marker: true,
                page: self.clone(),
            }]);
        }
        self.state.lock().resolve_calls += 1;
        Ok((0..self.specs.len())
            .map(|index| FakeElement {
                index,
                marker: false,
                page: self.clone(),
            })
            .collect())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), DriverError> {
        self.state.lock().clicked_points.push((x, y));
        let hit = self.specs.iter().position(|s| {
            s.bbox.map_or(false, |b| {
                x >= b.x && x <= b.x + b.width && y >= b.y && y <= b.y + b.height
            })
        });
        let Some(index) = hit else {
            return Err(DriverError::NotFound(format!("nothing at ({x}, {y})")));
        };
        self.state.lock().calls.push((index, "coordinate".to_string()));
        let behavior = self.specs[index].coordinate.clone();
        self.apply(&behavior).await
    }
}

#[async_trait]
impl BrowsingContext for FakePage {
    async fn location(&self) -> Result<String, DriverError> {
        let (location, stalled) = {
            let mut state = self.state.lock();
            state.location_reads += 1;
            let stalled = state
                .location_stalls_after
                .map_or(false, |n| state.location_reads > n);
            (state.location.clone(), stalled)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(location)
    }

    async fn page_count(&self) -> Result<usize, DriverError> {
        Ok(self.state.lock().pages)
    }

    async fn settle(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.state.lock().reloads += 1;
        Ok(())
    }
}
