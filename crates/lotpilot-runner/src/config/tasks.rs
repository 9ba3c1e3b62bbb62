use crate::config::Config;
use crate::Result;
use lotpilot::{EffectKind, Target};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

/// One logical action and the effect that proves it worked.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub name: String,

    pub target: TargetSpec,

    pub expect: Expect,

    /// Overrides the config-wide deadline.
    pub deadline_ms: Option<u64>,

    /// Keep going with the next task if this one fails.
    #[serde(default)]
    pub continue_on_failure: bool,
}

impl Task {
    pub fn deadline(&self, config: &Config) -> Duration {
        Duration::from_millis(self.deadline_ms.unwrap_or(config.deadline_ms))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::Config("task name is required".into()));
        }
        self.target.to_target()?.validate()?;
        self.expect.to_effect()?;
        Ok(())
    }
}

/// YAML form of a [`Target`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TargetSpec {
    /// CSS selector list for the candidate elements.
    pub role: String,

    /// Container selector the candidates are collected from.
    pub scope: Option<String>,

    /// Zero-based ordinal of the container.
    pub index: Option<usize>,

    /// Regex the candidate text must match.
    pub text: Option<String>,

    /// Attribute that must be present and non-blank (e.g. `href`).
    pub require_attribute: Option<String>,
}

impl TargetSpec {
    pub fn to_target(&self) -> Result<Target> {
        let mut target = Target::new(self.role.trim());
        if let Some(ref scope) = self.scope {
            target = target.within(scope.as_str());
        }
        if let Some(index) = self.index {
            target = target.nth(index);
        }
        if let Some(ref text) = self.text {
            target = target.with_text_hint(text)?;
        }
        if let Some(ref attr) = self.require_attribute {
            target = target.require_attribute(attr.as_str());
        }
        Ok(target)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scope, self.index) {
            (Some(scope), Some(i)) => write!(f, "'{}' in '{}' #{}", self.role, scope, i),
            (Some(scope), None) => write!(f, "'{}' in '{}'", self.role, scope),
            _ => write!(f, "'{}'", self.role),
        }
    }
}

/// The effect a task waits for.
///
/// ```yaml
/// expect: location_changed
/// expect: new_page_opened
/// expect:
///   element_appeared: { role: ".modal" }
/// ```
#[derive(Debug, Clone)]
pub enum Expect {
    LocationChanged,
    NewPageOpened,
    ElementAppeared(TargetSpec),
}

impl Expect {
    pub fn to_effect(&self) -> Result<EffectKind> {
        Ok(match self {
            Self::LocationChanged => EffectKind::LocationChanged,
            Self::NewPageOpened => EffectKind::NewPageOpened,
            Self::ElementAppeared(marker) => {
                let marker = marker.to_target()?;
                marker.validate()?;
                EffectKind::ElementAppeared(marker)
            }
        })
    }
}

const SCALAR_EXPECTS: &[&str] = &["location_changed", "new_page_opened"];
const MAP_EXPECTS: &[&str] = &["element_appeared"];

impl<'de> Deserialize<'de> for Expect {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ExpectVisitor)
    }
}

struct ExpectVisitor;

impl<'de> Visitor<'de> for ExpectVisitor {
    type Value = Expect;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("location_changed, new_page_opened or {element_appeared: <target>}")
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        match value {
            "location_changed" => Ok(Expect::LocationChanged),
            "new_page_opened" => Ok(Expect::NewPageOpened),
            other => Err(de::Error::unknown_variant(other, SCALAR_EXPECTS)),
        }
    }

    fn visit_map<M>(self, mut map: M) -> std::result::Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("expected an effect key"))?;

        let expect = match key.as_str() {
            "element_appeared" => Expect::ElementAppeared(map.next_value()?),
            other => return Err(de::Error::unknown_variant(other, MAP_EXPECTS)),
        };
        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom("expect takes exactly one effect"));
        }
        Ok(expect)
    }
}
