mod page;

pub use page::{EokaElement, EokaPage};

use crate::config::{BrowserConfig, Config};
use crate::Result;
use eoka::{Browser, Page};
use lotpilot::{ActionOutcome, Orchestrator};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// What happened to one task.
#[derive(Debug)]
pub struct TaskReport {
    pub name: String,
    pub outcome: ActionOutcome,
}

impl TaskReport {
    pub fn success(&self) -> bool {
        self.outcome.success
    }
}

/// Result of running a config.
#[derive(Debug)]
pub struct RunResult {
    /// Every task ran and succeeded.
    pub success: bool,
    /// Reports in task order; tasks after a stopping failure are absent.
    pub tasks: Vec<TaskReport>,
    pub duration_ms: u64,
}

impl RunResult {
    /// The first failed task, if any.
    pub fn first_failure(&self) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| !t.success())
    }
}

/// Runs task files against one browser tab.
pub struct Runner {
    browser: Browser,
    page: Page,
}

impl Runner {
    pub async fn new(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self { browser, page })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate to the start URL and perform every task through one
    /// orchestrator, so the breaker sees the whole run.
    pub async fn run(&self, config: &Config) -> Result<RunResult> {
        let start = Instant::now();
        let adapter = EokaPage::new(&self.browser, &self.page);
        let orchestrator = Orchestrator::new(adapter, adapter, config.engine.clone())?
            .with_classifier(config.classifier.build());

        info!("Navigating to: {}", config.target.url);
        self.page.goto(&config.target.url).await?;

        let mut tasks = Vec::with_capacity(config.tasks.len());
        let mut success = true;
        for (i, task) in config.tasks.iter().enumerate() {
            let target = task.target.to_target()?;
            let effect = task.expect.to_effect()?;
            debug!("Task {}: {} on {} expecting {}", i + 1, task.name, task.target, effect);

            let outcome = orchestrator
                .perform_action(&target, &effect, task.deadline(config))
                .await?;
            let passed = outcome.success;
            if passed {
                info!("✓ {}", task.name);
            } else {
                warn!(
                    "✗ {}: {}",
                    task.name,
                    outcome.detail.as_deref().unwrap_or("failed")
                );
            }
            tasks.push(TaskReport {
                name: task.name.clone(),
                outcome,
            });

            if !passed {
                if success {
                    self.handle_failure(config).await;
                }
                success = false;
                if !task.continue_on_failure {
                    break;
                }
            }
        }

        Ok(RunResult {
            success,
            tasks,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn handle_failure(&self, config: &Config) {
        let Some(path) = config.on_failure.as_ref().and_then(|f| f.screenshot.as_ref()) else {
            return;
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = path.replace("{timestamp}", &timestamp.to_string());
        info!("Saving failure screenshot to: {}", path);
        match self.page.screenshot().await {
            Ok(data) => {
                if let Err(e) = std::fs::write(&path, data) {
                    warn!("Failed to save screenshot: {}", e);
                }
            }
            Err(e) => warn!("Failed to capture screenshot: {}", e),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}
