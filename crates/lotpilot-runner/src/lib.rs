//! # lotpilot-runner
//!
//! Runs lotpilot interaction tasks from a YAML file against a real Chrome.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lotpilot_runner::{Config, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> lotpilot_runner::Result<()> {
//! let config = Config::load("inventory.yaml")?;
//! let runner = Runner::new(&config.browser).await?;
//! let result = runner.run(&config).await?;
//! println!("Success: {}", result.success);
//! # Ok(())
//! # }
//! ```

mod config;
mod runner;

pub use config::{
    BrowserConfig, ClassifierConfig, Config, Expect, OnFailure, ParamDef, Params, StartUrl, Task,
    TargetSpec, Viewport,
};
pub use runner::{EokaElement, EokaPage, RunResult, Runner, TaskReport};

/// Result type for lotpilot-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error(transparent)]
    Engine(#[from] lotpilot::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotpilot::{EffectKind, ErrorCategory};

    const MINIMAL: &str = r#"
name: "Inventory"
target:
  url: "https://portal.example.com/inventory"
tasks:
  - name: "open vehicle"
    target:
      role: "td a"
    expect: location_changed
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.name, "Inventory");
        assert_eq!(config.target.url, "https://portal.example.com/inventory");
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.deadline_ms, 30_000);
        assert!(!config.browser.headless);
        assert_eq!(config.engine.settle_ms, 2000);
        assert_eq!(config.engine.breaker.failure_threshold, 5);
    }

    #[test]
    fn test_parse_browser_config() {
        let yaml = r#"
name: "Test"
browser:
  headless: true
  proxy: "http://localhost:8080"
  user_agent: "Custom UA"
  viewport:
    width: 1920
    height: 1080
target:
  url: "https://example.com"
tasks:
  - name: "t"
    target: { role: "a" }
    expect: new_page_opened
"#;
        let config = Config::parse(yaml).unwrap();
        assert!(config.browser.headless);
        assert_eq!(config.browser.proxy, Some("http://localhost:8080".into()));
        assert_eq!(config.browser.user_agent, Some("Custom UA".into()));
        let viewport = config.browser.viewport.unwrap();
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, 1080);
    }

    #[test]
    fn test_parse_task_forms() {
        let yaml = r#"
name: "Test"
target:
  url: "https://example.com"
deadline_ms: 20000
tasks:
  - name: "row link"
    target:
      role: "td a"
      scope: "table.inventory tbody tr"
      index: 2
      text: "^Stock \\d+$"
      require_attribute: href
    expect: location_changed
    deadline_ms: 45000
  - name: "price editor"
    target:
      role: "button.edit-price"
    expect:
      element_appeared:
        role: ".modal.price-editor"
    continue_on_failure: true
  - name: "window sticker"
    target:
      role: "a.sticker"
    expect: new_page_opened
"#;
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.tasks.len(), 3);

        let row = &config.tasks[0];
        assert_eq!(row.target.index, Some(2));
        assert_eq!(row.target.require_attribute.as_deref(), Some("href"));
        assert!(matches!(row.expect, Expect::LocationChanged));
        assert_eq!(row.deadline(&config).as_millis(), 45_000);
        assert!(!row.continue_on_failure);

        let editor = &config.tasks[1];
        match editor.expect.to_effect().unwrap() {
            EffectKind::ElementAppeared(marker) => {
                assert_eq!(marker.role(), ".modal.price-editor")
            }
            other => panic!("expected element_appeared, got {}", other),
        }
        assert!(editor.continue_on_failure);
        assert_eq!(editor.deadline(&config).as_millis(), 20_000);

        assert!(matches!(config.tasks[2].expect, Expect::NewPageOpened));

        let target = row.target.to_target().unwrap();
        assert_eq!(target.scope(), Some("table.inventory tbody tr"));
        assert!(target.text_hint().unwrap().is_match("Stock 4471"));
    }

    #[test]
    fn test_parse_engine_and_classifier() {
        let yaml = r#"
name: "Test"
target:
  url: "https://example.com"
engine:
  settle_ms: 1500
  breaker:
    failure_threshold: 3
classifier:
  rules:
    - category: content
      phrases: ["Inventory Locked"]
tasks:
  - name: "t"
    target: { role: "a" }
    expect: location_changed
"#;
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.engine.settle_ms, 1500);
        assert_eq!(config.engine.native_click_timeout_ms, 5000);
        assert_eq!(config.engine.breaker.failure_threshold, 3);
        assert_eq!(config.engine.breaker.cooldown_ms, 60_000);

        let classifier = config.classifier.build();
        let class = classifier.classify_message("inventory locked by another user");
        assert_eq!(class.category, ErrorCategory::Content);
    }

    #[test]
    fn test_parse_on_failure() {
        let yaml = r#"
name: "Test"
target:
  url: "https://example.com"
tasks:
  - name: "t"
    target: { role: "a" }
    expect: location_changed
on_failure:
  screenshot: "failure-{timestamp}.png"
"#;
        let config = Config::parse(yaml).unwrap();
        let on_failure = config.on_failure.unwrap();
        assert_eq!(on_failure.screenshot, Some("failure-{timestamp}.png".into()));
    }

    #[test]
    fn test_unknown_expect_is_rejected() {
        let yaml = r#"
name: "Test"
target:
  url: "https://example.com"
tasks:
  - name: "t"
    target: { role: "a" }
    expect: form_submitted
"#;
        let err = Config::parse(yaml).unwrap_err().to_string();
        assert!(err.contains("form_submitted"));
    }

    #[test]
    fn test_validation_missing_name() {
        let yaml = r#"
target:
  url: "https://example.com"
tasks: []
"#;
        assert!(Config::parse(yaml).is_err());
    }

    #[test]
    fn test_validation_empty_url() {
        let yaml = MINIMAL.replace("https://portal.example.com/inventory", "");
        let err = Config::parse(&yaml).unwrap_err().to_string();
        assert!(err.contains("target.url"));
    }

    #[test]
    fn test_validation_no_tasks() {
        let yaml = r#"
name: "Test"
target:
  url: "https://example.com"
"#;
        let err = Config::parse(yaml).unwrap_err().to_string();
        assert!(err.contains("at least one task"));
    }

    #[test]
    fn test_validation_empty_role() {
        let yaml = MINIMAL.replace("\"td a\"", "\"  \"");
        let err = Config::parse(&yaml).unwrap_err().to_string();
        assert!(err.contains("open vehicle"));
    }

    #[test]
    fn test_validation_bad_text_hint() {
        let yaml = MINIMAL.replace("role: \"td a\"", "role: \"td a\"\n      text: \"(unclosed\"");
        assert!(Config::parse(&yaml).is_err());
    }

    #[test]
    fn test_validation_engine() {
        let yaml = MINIMAL.replace(
            "tasks:",
            "engine:\n  breaker:\n    failure_threshold: 0\ntasks:",
        );
        assert!(Config::parse(&yaml).is_err());
    }

    #[test]
    fn test_params_substitution() {
        let yaml = r##"
name: "Inventory"
params:
  dealer:
    required: true
  row:
    default: "0"
target:
  url: "https://portal.example.com/${dealer}/inventory"
tasks:
  - name: "open vehicle"
    target:
      role: "td a"
      text: "${stock}"
    expect: location_changed
"##;
        let params = Params::new().set("dealer", "d-114").set("stock", "4471");
        let config = Config::parse_with_params(yaml, &params).unwrap();
        assert_eq!(config.target.url, "https://portal.example.com/d-114/inventory");
        assert_eq!(config.tasks[0].target.text.as_deref(), Some("4471"));
    }

    #[test]
    fn test_params_missing_required() {
        let yaml = MINIMAL.replace(
            "target:\n  url: \"https://portal.example.com/inventory\"",
            "params:\n  dealer:\n    required: true\ntarget:\n  url: \"https://portal.example.com/${dealer}\"",
        );
        let err = Config::parse(&yaml).unwrap_err().to_string();
        assert!(err.contains("dealer"));
    }

    #[test]
    fn test_load_example_config() {
        let config = Config::load("configs/inventory.yaml").unwrap();
        assert_eq!(config.name, "Inventory walk");
        assert!(!config.tasks.is_empty());
    }

    #[test]
    fn test_error_display_passes_engine_errors_through() {
        let err: Error = lotpilot::Error::InvalidTarget("role must not be empty".into()).into();
        assert_eq!(err.to_string(), "invalid target: role must not be empty");
    }
}
