//! uiprobe harness
//!
//! Browser-driven probes of a live chat UI. A probe opens the UI, optionally
//! switches a capability on, types a prompt, tries to submit it and then
//! counts text that suggests the capability kicked in. Every step is lenient:
//! the UI is a moving third-party target, so the harness reports what it
//! could attempt and what it saw rather than asserting a fixed contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ProbeRunner                           │
//! │    ├── ProbeSpec::load_all(path) -> [ProbeSpec]             │
//! │    ├── run_specs(specs) -> SuiteResult   (bounded parallel) │
//! │    └── write_results() -> run_<ts>/probe-results.json       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session (one per probe, closed on every exit path)          │
//! │    ├── navigate(url)           wait for a stable UI         │
//! │    ├── locate / fill           strict, read-back            │
//! │    ├── submit -> Acted | Skipped | Absent                   │
//! │    ├── poll_indicators(set, wait) -> IndicatorReport        │
//! │    └── capture(label) -> EvidenceRecord                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Driver (trait)                                              │
//! │    ├── ChromiumDriver     CDP via chromiumoxide             │
//! │    └── ScriptedDriver     in-memory page                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod activation;
pub mod config;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod indicator;
pub mod request;
pub mod runner;
pub mod selector;
pub mod session;
pub mod spec;

pub use activation::Activation;
pub use config::{ProbeConfig, Timeouts};
pub use driver::{ChromiumFactory, Driver, DriverFactory, ScriptedFactory};
pub use error::{ProbeError, ProbeResult};
pub use evidence::EvidenceRecord;
pub use indicator::{Indicator, IndicatorReport};
pub use request::ProbeRequest;
pub use runner::{ProbeReport, ProbeRunner, ProbeVerdict, RunnerConfig, SuiteResult};
pub use selector::{Located, Locator, Selector};
pub use session::{ActionOutcome, ProbeOutcome, ProbeStage, Session};
pub use spec::ProbeSpec;
