//! Chrome DevTools Protocol driver

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Driver, DriverFactory, PageMetrics};
use crate::config::BrowserSettings;
use crate::error::{ProbeError, ProbeResult};
use crate::selector::{js_string, Selector};

/// A launched browser with a single page
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromiumDriver {
    /// Launch a browser according to `settings` and open a blank page
    pub async fn launch(settings: &BrowserSettings) -> ProbeResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height)
            .request_timeout(Duration::from_millis(settings.request_timeout_ms));

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some(dir) = &settings.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        for arg in &settings.args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder.build().map_err(ProbeError::BrowserLaunch)?;

        info!(headless = settings.headless, "Launching browser");

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ProbeError::BrowserLaunch(e.to_string()))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::BrowserLaunch(format!("failed to open page: {}", e)))?;

        Ok(Self {
            browser,
            page,
            handler,
            closed: false,
        })
    }

    /// Evaluate an expression and deserialize its value
    async fn eval<T: DeserializeOwned>(&self, expression: String) -> ProbeResult<T> {
        let result = self
            .page
            .evaluate(expression.as_str())
            .await
            .map_err(|e| ProbeError::Driver(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| ProbeError::Driver(format!("unexpected evaluation result: {}", e)))
    }

    /// Run `body` against the `index`-th match, bound as `el`.
    ///
    /// The expression yields `{ found: false }` when there is no such match.
    fn with_element(selector: &Selector, index: usize, body: &str) -> String {
        format!(
            r#"(() => {{
    const el = ({query})[{index}];
    if (!el) return {{ found: false }};
    {body}
}})()"#,
            query = selector.to_js_query(),
            index = index,
            body = body,
        )
    }

    async fn element_call<T: DeserializeOwned>(
        &self,
        selector: &Selector,
        index: usize,
        body: &str,
    ) -> ProbeResult<T> {
        #[derive(serde::Deserialize)]
        struct Reply<T> {
            found: bool,
            value: Option<T>,
        }

        let reply: Reply<T> = self.eval(Self::with_element(selector, index, body)).await?;
        if !reply.found {
            return Err(ProbeError::ElementNotFound(format!("{} (index {})", selector, index)));
        }
        reply
            .value
            .ok_or_else(|| ProbeError::Driver(format!("no value returned for {}", selector)))
    }
}

const FILL_BODY: &str = r#"
    const text = __TEXT__;
    el.focus();
    if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') {
        const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
        if (desc && desc.set) { desc.set.call(el, text); } else { el.value = text; }
    } else if (el.isContentEditable) {
        el.textContent = text;
    } else {
        return { found: true, value: false };
    }
    el.dispatchEvent(new InputEvent('input', { bubbles: true, data: text, inputType: 'insertText' }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return { found: true, value: true };
"#;

const CONTENT_BODY: &str = r#"
    const text = (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA')
        ? el.value
        : (el.innerText || el.textContent || '');
    return { found: true, value: text };
"#;

const ENABLED_BODY: &str = r#"
    const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true';
    return { found: true, value: enabled };
"#;

const CLICK_BODY: &str = r#"
    el.scrollIntoView({ block: 'center' });
    el.click();
    return { found: true, value: true };
"#;

const METRICS_EXPR: &str = r#"({
    readyState: document.readyState,
    elementCount: document.getElementsByTagName('*').length
})"#;

#[async_trait]
impl Driver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> ProbeResult<()> {
        debug!("goto {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ProbeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&mut self) -> ProbeResult<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|e| ProbeError::Driver(e.to_string()))
    }

    async fn metrics(&mut self) -> ProbeResult<PageMetrics> {
        self.eval(METRICS_EXPR.to_string()).await
    }

    async fn count(&mut self, selector: &Selector) -> ProbeResult<usize> {
        self.eval(format!("({}).length", selector.to_js_query())).await
    }

    async fn fill(&mut self, selector: &Selector, index: usize, text: &str) -> ProbeResult<()> {
        let body = FILL_BODY.replace("__TEXT__", &js_string(text));
        let editable: bool = self.element_call(selector, index, &body).await?;
        if !editable {
            return Err(ProbeError::Driver(format!("{} is not editable", selector)));
        }
        Ok(())
    }

    async fn content(&mut self, selector: &Selector, index: usize) -> ProbeResult<Option<String>> {
        match self.element_call::<String>(selector, index, CONTENT_BODY).await {
            Ok(text) => Ok(Some(text)),
            Err(ProbeError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn is_enabled(&mut self, selector: &Selector, index: usize) -> ProbeResult<bool> {
        self.element_call(selector, index, ENABLED_BODY).await
    }

    async fn click(&mut self, selector: &Selector, index: usize) -> ProbeResult<()> {
        let _: bool = self.element_call(selector, index, CLICK_BODY).await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> ProbeResult<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| ProbeError::Driver(format!("screenshot failed: {}", e)))
    }

    async fn close(&mut self) -> ProbeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Waiting for browser exit failed: {}", e);
        }
        self.handler.abort();
        debug!("Browser closed");
        Ok(())
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        if !self.closed {
            self.handler.abort();
        }
    }
}

/// Launches a fresh browser for every session
#[derive(Debug, Clone, Default)]
pub struct ChromiumFactory {
    settings: BrowserSettings,
}

impl ChromiumFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DriverFactory for ChromiumFactory {
    async fn launch(&self) -> ProbeResult<Box<dyn Driver>> {
        let driver = ChromiumDriver::launch(&self.settings).await?;
        Ok(Box::new(driver))
    }

    fn name(&self) -> &str {
        "chromium"
    }
}
