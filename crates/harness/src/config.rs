//! Harness configuration
//!
//! Ambient settings only. What a probe targets and types lives in its spec
//! file; this covers the browser, the harness timeouts and where artifacts go.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ProbeResult;

/// Top-level configuration, loaded from `uiprobe.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Browser launch settings
    pub browser: BrowserSettings,

    /// Harness operation timeouts
    pub timeouts: Timeouts,

    /// Artifact output
    pub artifacts: ArtifactSettings,

    /// Suite runner settings
    pub runner: RunnerSettings,
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium executable (None = auto-detect)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Run without a visible window
    pub headless: bool,

    /// Window size in pixels
    pub window_width: u32,
    pub window_height: u32,

    /// Profile directory (None = fresh temporary profile)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,

    /// Per-CDP-request timeout
    pub request_timeout_ms: u64,

    /// Extra command line switches
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            window_width: 1280,
            window_height: 720,
            user_data_dir: None,
            request_timeout_ms: 30_000,
            args: vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

/// Bounds for every wait the harness performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Upper bound for navigation plus UI stabilisation
    pub navigation_ms: u64,

    /// Interval between stability samples
    pub stable_poll_ms: u64,

    /// Consecutive identical samples needed to call the UI stable
    pub stable_samples: u32,

    /// Default upper bound for `locate`
    pub locate_ms: u64,

    /// Interval between `locate` attempts
    pub locate_poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            stable_poll_ms: 250,
            stable_samples: 3,
            locate_ms: 5_000,
            locate_poll_ms: 100,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn stable_poll(&self) -> Duration {
        Duration::from_millis(self.stable_poll_ms)
    }

    pub fn locate(&self) -> Duration {
        Duration::from_millis(self.locate_ms)
    }

    pub fn locate_poll(&self) -> Duration {
        Duration::from_millis(self.locate_poll_ms)
    }
}

/// Where screenshots and results are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Root directory; each run gets a `run_<timestamp>` subdirectory
    pub dir: PathBuf,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("probe-results"),
        }
    }
}

/// Suite runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Sessions allowed in flight at once
    pub concurrency: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl ProbeConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> ProbeResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> ProbeResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
