//! Declarative YAML probe specifications

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::activation::Activation;
use crate::error::{ProbeError, ProbeResult};
use crate::evidence::sanitize;
use crate::indicator::Indicator;
use crate::request::ProbeRequest;

/// A complete probe parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Unique name; also the probe's artifact directory
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering probes
    #[serde(default)]
    pub tags: Vec<String>,

    /// Interaction to attempt; absent for documentation-only probes
    #[serde(default)]
    pub request: Option<ProbeRequest>,

    /// How to switch the probed capability on
    #[serde(default)]
    pub activation: Option<Activation>,

    /// Fail the probe when activation cannot be confirmed
    #[serde(default)]
    pub require_activation: bool,

    /// Fixed delay between submit and indicator polling
    #[serde(default = "default_indicator_wait")]
    pub indicator_wait_ms: u64,

    /// UI states to count after submitting
    #[serde(default)]
    pub indicators: Vec<Indicator>,

    /// Screenshot labels
    #[serde(default)]
    pub checkpoints: Checkpoints,

    /// Free-form notes, logged when the probe runs
    #[serde(default)]
    pub notes: String,

    /// File this spec was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn default_indicator_wait() -> u64 {
    5000
}

/// Labels for the screenshots taken during a probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkpoints {
    /// After activation. Unset means `activated` for strategies that change
    /// the page and no screenshot otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<String>,
    /// After the input has been filled
    pub filled: String,
    /// After submit and indicator polling
    pub submitted: String,
}

impl Checkpoints {
    /// Label to capture after `activation`, if any
    pub fn after_activation(&self, activation: &Activation) -> Option<&str> {
        match &self.activated {
            Some(label) => Some(label.as_str()),
            None if activation.changes_page() => Some("activated"),
            None => None,
        }
    }
}

impl Default for Checkpoints {
    fn default() -> Self {
        Self {
            activated: None,
            filled: "filled".to_string(),
            submitted: "submitted".to_string(),
        }
    }
}

impl ProbeSpec {
    /// Probes without a request only document behaviour
    pub fn is_documentation(&self) -> bool {
        self.request.is_none()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Directory name for this probe's artifacts within a run
    pub fn dir_name(&self) -> String {
        sanitize(&self.name)
    }

    /// Fail if two specs would share an artifact directory
    pub fn check_unique(specs: &[Self]) -> ProbeResult<()> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        for spec in specs {
            if let Some(other) = seen.insert(spec.dir_name(), &spec.name) {
                return Err(ProbeError::SpecParse(format!(
                    "probe names '{}' and '{}' both map to artifact directory '{}'",
                    other,
                    spec.name,
                    spec.dir_name()
                )));
            }
        }
        Ok(())
    }

    /// Parse a probe spec from YAML string
    pub fn from_yaml(yaml: &str) -> ProbeResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a probe spec from a YAML file
    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)
            .map_err(|e| ProbeError::SpecParse(format!("{}: {}", path.display(), e)))?;
        spec.source = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Load one spec file, or every `.yaml`/`.yml` file under a directory
    pub fn load_all(path: &Path) -> ProbeResult<Vec<Self>> {
        if path.is_file() {
            return Ok(vec![Self::from_file(path)?]);
        }
        if !path.is_dir() {
            return Err(ProbeError::SpecParse(format!(
                "no probe specs at {}",
                path.display()
            )));
        }

        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        Self::check_unique(&specs)?;
        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.has_tag(tag)).collect()
    }

    /// Check the parts serde cannot
    pub fn validate(&self) -> ProbeResult<()> {
        if self.name.trim().is_empty() {
            return Err(ProbeError::SpecParse("probe name is empty".to_string()));
        }

        let mut names = HashSet::new();
        for indicator in &self.indicators {
            indicator.validate()?;
            if !names.insert(indicator.name.as_str()) {
                return Err(ProbeError::SpecParse(format!(
                    "probe '{}' defines indicator '{}' twice",
                    self.name, indicator.name
                )));
            }
        }

        if self.is_documentation() {
            if self.activation.is_some() || !self.indicators.is_empty() {
                return Err(ProbeError::SpecParse(format!(
                    "probe '{}' has no request, so activation and indicators cannot apply",
                    self.name
                )));
            }
        } else if self.require_activation && self.activation.is_none() {
            return Err(ProbeError::SpecParse(format!(
                "probe '{}' requires activation but defines none",
                self.name
            )));
        }

        Ok(())
    }
}
