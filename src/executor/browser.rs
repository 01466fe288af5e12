//! Browser-backed step executor using Playwright.

use async_trait::async_trait;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;

use super::{StepExecutor, StepSession};
use crate::error::StepflowError;
use crate::model::{Step, StepKind, StepResult};

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl std::str::FromStr for BrowserKind {
    type Err = StepflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" | "safari" => Ok(BrowserKind::Webkit),
            other => Err(StepflowError::validation(format!(
                "unknown browser \"{}\" (expected chromium, firefox or webkit)",
                other
            ))),
        }
    }
}

/// Browser executor configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub kind: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Timeout for verify steps when the step config carries none (ms)
    pub default_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let headless = std::env::var("STEPFLOW_HEADLESS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            kind: BrowserKind::Chromium,
            headless,
            viewport_width: 1280,
            viewport_height: 720,
            default_timeout_ms: 5000,
        }
    }
}

/// Launches one fresh browser per session.
pub struct BrowserExecutor {
    config: BrowserConfig,
}

impl BrowserExecutor {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StepExecutor for BrowserExecutor {
    async fn open_session(&self) -> Result<Box<dyn StepSession>, StepflowError> {
        let session = BrowserSession::launch(self.config.clone()).await?;
        Ok(Box::new(session))
    }
}

struct BrowserSession {
    // Held for the lifetime of the session so the driver process stays up.
    _playwright: Playwright,
    browser: Browser,
    context: BrowserContext,
    page: Page,
    default_timeout_ms: u64,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig) -> Result<Self, StepflowError> {
        let playwright = Playwright::initialize().await.map_err(|e| {
            StepflowError::transport(format!("failed to initialize Playwright: {:?}", e))
        })?;

        let browser_type = match config.kind {
            BrowserKind::Chromium => playwright.chromium(),
            BrowserKind::Firefox => playwright.firefox(),
            BrowserKind::Webkit => playwright.webkit(),
        };

        let browser = browser_type
            .launcher()
            .headless(config.headless)
            .launch()
            .await
            .map_err(|e| StepflowError::transport(format!("failed to launch browser: {:?}", e)))?;

        let context = browser.context_builder().build().await.map_err(|e| {
            StepflowError::transport(format!("failed to create browser context: {:?}", e))
        })?;

        let page = context
            .new_page()
            .await
            .map_err(|e| StepflowError::transport(format!("failed to open page: {:?}", e)))?;

        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await
        .map_err(|e| StepflowError::transport(format!("failed to set viewport: {:?}", e)))?;

        Ok(Self {
            _playwright: playwright,
            browser,
            context,
            page,
            default_timeout_ms: config.default_timeout_ms,
        })
    }

    async fn navigate(&self, step: &Step) -> StepResult {
        let url = match step.url() {
            Some(url) => url,
            None => return StepResult::failed("Navigation failed", "no url configured"),
        };
        match self.page.goto_builder(url).goto().await {
            Ok(_) => StepResult::ok(format!("Navigated to {}", url)),
            Err(e) => StepResult::failed(
                format!("Failed to navigate to {}", url),
                format!("{:?}", e),
            ),
        }
    }

    async fn click(&self, step: &Step) -> StepResult {
        let selector = match step.selector() {
            Some(sel) => sel,
            None => return StepResult::failed("Click failed", "no selector configured"),
        };
        match self.page.click_builder(selector).click().await {
            Ok(_) => StepResult::ok(format!("Clicked element \"{}\"", selector)),
            Err(e) => StepResult::failed(
                format!("Failed to click \"{}\"", selector),
                format!("{:?}", e),
            ),
        }
    }

    async fn input(&self, step: &Step) -> StepResult {
        let (selector, text) = match (step.selector(), step.text()) {
            (Some(sel), Some(text)) => (sel, text),
            _ => return StepResult::failed("Input failed", "selector and text are required"),
        };
        let element = match self.page.query_selector(selector).await {
            Ok(Some(el)) => el,
            Ok(None) => {
                return StepResult::failed(
                    format!("Failed to type into \"{}\"", selector),
                    "element not found",
                )
            }
            Err(e) => {
                return StepResult::failed(
                    format!("Failed to type into \"{}\"", selector),
                    format!("{:?}", e),
                )
            }
        };
        match element.fill_builder(text).fill().await {
            Ok(_) => StepResult::ok(format!("Typed \"{}\" into \"{}\"", text, selector)),
            Err(e) => StepResult::failed(
                format!("Failed to type into \"{}\"", selector),
                format!("{:?}", e),
            ),
        }
    }

    async fn wait(&self, step: &Step) -> StepResult {
        let ms = step.duration_ms().unwrap_or(1000);
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
        StepResult::ok(format!("Waited {}ms", ms))
    }

    async fn verify(&self, step: &Step) -> StepResult {
        let selector = match step.selector() {
            Some(sel) => sel,
            None => return StepResult::failed("Verify failed", "no selector configured"),
        };
        let timeout_ms = step.timeout_ms().unwrap_or(self.default_timeout_ms);

        let result = self
            .page
            .wait_for_selector_builder(selector)
            .timeout(timeout_ms as f64)
            .wait_for_selector()
            .await;

        match result {
            Ok(_) => StepResult::ok(format!("Element \"{}\" is visible", selector)),
            Err(_) => StepResult::failed(
                format!("Element \"{}\" not found", selector),
                format!("not visible within {}ms", timeout_ms),
            ),
        }
    }

    async fn refresh(&self) -> StepResult {
        match self.page.reload_builder().reload().await {
            Ok(_) => StepResult::ok("Page refreshed"),
            Err(e) => StepResult::failed("Failed to refresh page", format!("{:?}", e)),
        }
    }
}

#[async_trait]
impl StepSession for BrowserSession {
    async fn perform(&mut self, step: &Step) -> Result<StepResult, StepflowError> {
        let result = match step.kind {
            StepKind::Navigate => self.navigate(step).await,
            StepKind::Click => self.click(step).await,
            StepKind::Input => self.input(step).await,
            StepKind::Wait => self.wait(step).await,
            StepKind::Verify => self.verify(step).await,
            StepKind::Refresh => self.refresh().await,
        };
        Ok(result)
    }

    async fn release(self: Box<Self>) {
        if let Err(e) = self.context.close().await {
            log::warn!("failed to close browser context: {:?}", e);
        }
        if let Err(e) = self.browser.close().await {
            log::warn!("failed to close browser: {:?}", e);
        }
    }
}
