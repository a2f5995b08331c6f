//! Outcome indicators: locale-variant text patterns counted on the page

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, ProbeResult};
use crate::selector::Selector;

/// One locale's wording for an indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalePattern {
    pub locale: String,
    /// Case-insensitive regex source, e.g. `searching|sources|researching`
    pub pattern: String,
}

impl LocalePattern {
    pub fn new(locale: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            pattern: pattern.into(),
        }
    }

    pub fn selector(&self) -> ProbeResult<Selector> {
        Selector::text_pattern(self.pattern.clone())
    }
}

/// A named UI state detected by any of its patterns (OR semantics)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub patterns: Vec<LocalePattern>,
}

impl Indicator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            patterns: Vec::new(),
        }
    }

    /// Add a locale variant
    pub fn variant(mut self, locale: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.patterns.push(LocalePattern::new(locale, pattern));
        self
    }

    /// Check every pattern compiles
    pub fn validate(&self) -> ProbeResult<()> {
        if self.name.trim().is_empty() {
            return Err(ProbeError::SpecParse("indicator name is empty".to_string()));
        }
        for pattern in &self.patterns {
            pattern.selector().map_err(|e| {
                ProbeError::SpecParse(format!(
                    "indicator '{}' ({}): {}",
                    self.name, pattern.locale, e
                ))
            })?;
        }
        Ok(())
    }
}

/// Count for one locale variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCount {
    pub locale: String,
    pub pattern: String,
    pub count: usize,
}

/// Counts for one indicator across its variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorCount {
    pub name: String,
    pub variants: Vec<VariantCount>,
}

impl IndicatorCount {
    pub fn total(&self) -> usize {
        self.variants.iter().map(|v| v.count).sum()
    }

    /// Advisory only: a zero count is not a failure
    pub fn found(&self) -> bool {
        self.total() > 0
    }

    /// `EN: 2, RU: 0` style breakdown for logs
    pub fn breakdown(&self) -> String {
        self.variants
            .iter()
            .map(|v| format!("{}: {}", v.locale.to_uppercase(), v.count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Result of polling a set of indicators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorReport {
    pub waited_ms: u64,
    pub indicators: Vec<IndicatorCount>,
}

impl IndicatorReport {
    pub fn get(&self, name: &str) -> Option<&IndicatorCount> {
        self.indicators.iter().find(|i| i.name == name)
    }

    /// Count for the named indicator, zero when it was not polled
    pub fn count(&self, name: &str) -> usize {
        self.get(name).map(IndicatorCount::total).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.indicators.iter().map(IndicatorCount::total).sum()
    }
}
