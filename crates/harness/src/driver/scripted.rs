//! In-memory page model implementing [`Driver`]
//!
//! Elements answer to the exact CSS strings they were registered with and to
//! text patterns over their text. Clicking an element can reveal more
//! elements, which is how tests model "indicators appear after submit".

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, ImageOutputFormat, Rgb};
use parking_lot::Mutex;

use super::{Driver, DriverFactory, PageMetrics};
use crate::error::{ProbeError, ProbeResult};
use crate::selector::Selector;

/// An element on a scripted page
#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    /// CSS selector strings this element matches verbatim
    pub css: Vec<String>,
    pub text: String,
    /// Editable content; `None` means the element cannot be filled
    pub value: Option<String>,
    pub enabled: bool,
    pub visible: bool,
    /// Elements added to the page when this one is clicked
    pub reveals: Vec<FakeElement>,
}

impl FakeElement {
    pub fn new(css: impl Into<String>) -> Self {
        Self {
            css: vec![css.into()],
            text: String::new(),
            value: None,
            enabled: true,
            visible: true,
            reveals: Vec::new(),
        }
    }

    /// A visible element that only carries text
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            css: Vec::new(),
            ..Self::new("").with_text(text)
        }
    }

    pub fn also_matches(mut self, css: impl Into<String>) -> Self {
        self.css.push(css.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn editable(mut self) -> Self {
        self.value = Some(String::new());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn reveals(mut self, element: FakeElement) -> Self {
        self.reveals.push(element);
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Css(css) => self.css.iter().any(|c| c == css),
            Selector::TextPattern { .. } => self.visible && selector.matches_text(&self.text),
        }
    }
}

/// Calls a scripted driver received, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Goto(String),
    Fill { selector: String, text: String },
    Click(String),
    Screenshot,
    Close,
}

/// Page state shared between a driver and the test that built it
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    pub elements: Vec<FakeElement>,
    /// Metric samples that report `loading` after each navigation
    pub loading_samples: u32,
    /// Element count keeps changing, so the page never settles
    pub unstable: bool,
    /// `goto` fails with this message
    pub navigation_error: Option<String>,
    /// Selectors (as displayed) whose `count` fails
    pub failing_counts: Vec<String>,
    /// Delay before `metrics` and `count` answer
    pub response_delay: Option<Duration>,
    /// Screenshot dimensions
    pub viewport: (u32, u32),
    url: Option<String>,
    samples: u32,
    screenshots: u32,
    calls: Vec<DriverCall>,
    closed: bool,
}

impl Default for ScriptedPage {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            loading_samples: 1,
            unstable: false,
            navigation_error: None,
            failing_counts: Vec::new(),
            response_delay: None,
            viewport: (64, 48),
            url: None,
            samples: 0,
            screenshots: 0,
            calls: Vec::new(),
            closed: false,
        }
    }
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn never_stable(mut self) -> Self {
        self.unstable = true;
        self
    }

    pub fn failing_navigation(mut self, reason: impl Into<String>) -> Self {
        self.navigation_error = Some(reason.into());
        self
    }

    /// `count` on `selector` fails, as when the page throws evaluating it
    pub fn failing_count(mut self, selector: impl Into<String>) -> Self {
        self.failing_counts.push(selector.into());
        self
    }

    /// `metrics` and `count` take `delay` to answer
    pub fn slow(mut self, delay: Duration) -> Self {
        self.response_delay = Some(delay);
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    /// Number of clicks on exactly `selector`
    pub fn clicks_on(&self, selector: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DriverCall::Click(s) if s == selector))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn nth_mut(&mut self, selector: &Selector, index: usize) -> ProbeResult<&mut FakeElement> {
        self.elements
            .iter_mut()
            .filter(|e| e.matches(selector))
            .nth(index)
            .ok_or_else(|| ProbeError::ElementNotFound(format!("{} (index {})", selector, index)))
    }

    fn nth(&self, selector: &Selector, index: usize) -> Option<&FakeElement> {
        self.elements.iter().filter(|e| e.matches(selector)).nth(index)
    }

    fn ensure_open(&self) -> ProbeResult<()> {
        if self.closed {
            return Err(ProbeError::Driver("browser connection closed".to_string()));
        }
        Ok(())
    }
}

/// Driver over a shared [`ScriptedPage`]
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    page: Arc<Mutex<ScriptedPage>>,
}

impl ScriptedDriver {
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page: Arc::new(Mutex::new(page)),
        }
    }

    /// Handle for inspecting the page after the driver has been moved into a session
    pub fn page(&self) -> Arc<Mutex<ScriptedPage>> {
        Arc::clone(&self.page)
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn goto(&mut self, url: &str) -> ProbeResult<()> {
        let mut page = self.page.lock();
        page.ensure_open()?;
        page.calls.push(DriverCall::Goto(url.to_string()));
        if let Some(reason) = page.navigation_error.clone() {
            return Err(ProbeError::Navigation {
                url: url.to_string(),
                reason,
            });
        }
        page.url = Some(url.to_string());
        page.samples = 0;
        Ok(())
    }

    async fn current_url(&mut self) -> ProbeResult<Option<String>> {
        let page = self.page.lock();
        page.ensure_open()?;
        Ok(page.url.clone())
    }

    async fn metrics(&mut self) -> ProbeResult<PageMetrics> {
        let (metrics, delay) = {
            let mut page = self.page.lock();
            page.ensure_open()?;
            page.samples += 1;
            let ready_state = if page.samples <= page.loading_samples {
                "loading"
            } else {
                "complete"
            };
            let churn = if page.unstable { page.samples as usize } else { 0 };
            let metrics = PageMetrics {
                ready_state: ready_state.to_string(),
                element_count: page.elements.len() + churn,
            };
            (metrics, page.response_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(metrics)
    }

    async fn count(&mut self, selector: &Selector) -> ProbeResult<usize> {
        let (count, delay) = {
            let page = self.page.lock();
            page.ensure_open()?;
            let shown = selector.to_string();
            if page.failing_counts.iter().any(|s| *s == shown) {
                return Err(ProbeError::Driver(format!("evaluating {} threw", shown)));
            }
            let count = page.elements.iter().filter(|e| e.matches(selector)).count();
            (count, page.response_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(count)
    }

    async fn fill(&mut self, selector: &Selector, index: usize, text: &str) -> ProbeResult<()> {
        let mut page = self.page.lock();
        page.ensure_open()?;
        page.calls.push(DriverCall::Fill {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        let element = page.nth_mut(selector, index)?;
        match element.value.as_mut() {
            Some(value) => {
                *value = text.to_string();
                Ok(())
            }
            None => Err(ProbeError::Driver(format!("{} is not editable", selector))),
        }
    }

    async fn content(&mut self, selector: &Selector, index: usize) -> ProbeResult<Option<String>> {
        let page = self.page.lock();
        page.ensure_open()?;
        Ok(page
            .nth(selector, index)
            .map(|e| e.value.clone().unwrap_or_else(|| e.text.clone())))
    }

    async fn is_enabled(&mut self, selector: &Selector, index: usize) -> ProbeResult<bool> {
        let page = self.page.lock();
        page.ensure_open()?;
        page.nth(selector, index)
            .map(|e| e.enabled)
            .ok_or_else(|| ProbeError::ElementNotFound(format!("{} (index {})", selector, index)))
    }

    async fn click(&mut self, selector: &Selector, index: usize) -> ProbeResult<()> {
        let mut page = self.page.lock();
        page.ensure_open()?;
        page.calls.push(DriverCall::Click(selector.to_string()));
        let revealed = std::mem::take(&mut page.nth_mut(selector, index)?.reveals);
        page.elements.extend(revealed);
        Ok(())
    }

    async fn screenshot(&mut self) -> ProbeResult<Vec<u8>> {
        let mut page = self.page.lock();
        page.ensure_open()?;
        page.calls.push(DriverCall::Screenshot);
        page.screenshots += 1;

        // Vary the fill so consecutive captures hash differently
        let shade = (page.screenshots.wrapping_mul(37) % 256) as u8;
        let (width, height) = page.viewport;
        let img = ImageBuffer::from_pixel(width, height, Rgb([shade, 128, 255 - shade]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
        Ok(bytes)
    }

    async fn close(&mut self) -> ProbeResult<()> {
        let mut page = self.page.lock();
        if !page.closed {
            page.calls.push(DriverCall::Close);
            page.closed = true;
        }
        Ok(())
    }
}

/// Hands out a fresh scripted page per session and keeps a handle to each
pub struct ScriptedFactory {
    template: Box<dyn Fn() -> ScriptedPage + Send + Sync>,
    launched: Mutex<Vec<Arc<Mutex<ScriptedPage>>>>,
    fail_launch: Option<String>,
}

impl ScriptedFactory {
    pub fn new<F>(template: F) -> Self
    where
        F: Fn() -> ScriptedPage + Send + Sync + 'static,
    {
        Self {
            template: Box::new(template),
            launched: Mutex::new(Vec::new()),
            fail_launch: None,
        }
    }

    /// Every launch fails, as when no browser is installed
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_launch: Some(reason.into()),
            ..Self::new(ScriptedPage::new)
        }
    }

    /// Pages handed out so far, in launch order
    pub fn launched(&self) -> Vec<Arc<Mutex<ScriptedPage>>> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl DriverFactory for ScriptedFactory {
    async fn launch(&self) -> ProbeResult<Box<dyn Driver>> {
        if let Some(reason) = &self.fail_launch {
            return Err(ProbeError::BrowserLaunch(reason.clone()));
        }
        let driver = ScriptedDriver::new((self.template)());
        self.launched.lock().push(driver.page());
        Ok(Box::new(driver))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
