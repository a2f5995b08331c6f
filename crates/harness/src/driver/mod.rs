//! Browser automation boundary
//!
//! The harness never talks to a browser directly. Everything goes through
//! [`Driver`], which exposes the handful of primitives a probe needs over
//! [`Selector`]s. [`ChromiumDriver`] speaks CDP to a real browser;
//! [`ScriptedDriver`] serves an in-memory page for tests and dry runs.

pub mod chromium;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProbeResult;
use crate::selector::Selector;

pub use chromium::{ChromiumDriver, ChromiumFactory};
pub use scripted::{DriverCall, FakeElement, ScriptedDriver, ScriptedFactory, ScriptedPage};

/// Snapshot of document state used to decide whether the UI has settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub ready_state: String,
    pub element_count: usize,
}

impl PageMetrics {
    pub fn is_complete(&self) -> bool {
        self.ready_state == "complete"
    }
}

/// One page in one browser context.
///
/// Element-level calls take the raw selector plus the index of the match to
/// act on; resolving counts and strictness is the session's job.
#[async_trait]
pub trait Driver: Send {
    /// Start loading `url` in the page
    async fn goto(&mut self, url: &str) -> ProbeResult<()>;

    /// URL of the current document, if any
    async fn current_url(&mut self) -> ProbeResult<Option<String>>;

    /// Sample document state
    async fn metrics(&mut self) -> ProbeResult<PageMetrics>;

    /// Number of elements currently matching `selector`
    async fn count(&mut self, selector: &Selector) -> ProbeResult<usize>;

    /// Replace the content of the `index`-th match with `text`
    async fn fill(&mut self, selector: &Selector, index: usize, text: &str) -> ProbeResult<()>;

    /// Current content (value or text) of the `index`-th match
    async fn content(&mut self, selector: &Selector, index: usize) -> ProbeResult<Option<String>>;

    /// Whether the `index`-th match accepts interaction
    async fn is_enabled(&mut self, selector: &Selector, index: usize) -> ProbeResult<bool>;

    /// Click the `index`-th match
    async fn click(&mut self, selector: &Selector, index: usize) -> ProbeResult<()>;

    /// PNG screenshot of the viewport
    async fn screenshot(&mut self) -> ProbeResult<Vec<u8>>;

    /// Shut the browser context down
    async fn close(&mut self) -> ProbeResult<()>;
}

/// Creates one driver per session
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> ProbeResult<Box<dyn Driver>>;

    /// Short name for logs
    fn name(&self) -> &str;
}
