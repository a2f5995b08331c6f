//! Probe requests: what to open, what to type and where

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProbeResult;
use crate::selector::Selector;

/// One interaction attempt against the target UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    /// Page to open
    pub url: String,

    /// Query parameters merged into `url`, e.g. `model=gpt-5-pro`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    /// Text typed into the input surface
    pub input_text: String,

    /// Input surface; the first match is used
    pub input: Selector,

    /// Submit control; the first match is used
    pub submit: Selector,
}

impl ProbeRequest {
    pub fn new(
        url: impl Into<String>,
        input_text: impl Into<String>,
        input: Selector,
        submit: Selector,
    ) -> Self {
        Self {
            url: url.into(),
            query: BTreeMap::new(),
            input_text: input_text.into(),
            input,
            submit,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// `url` with `query` merged in; keys already on the URL are replaced
    pub fn target_url(&self) -> ProbeResult<Url> {
        let mut url = Url::parse(&self.url)?;
        if self.query.is_empty() {
            return Ok(url);
        }

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !self.query.contains_key(key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter())
            .extend_pairs(self.query.iter());
        Ok(url)
    }

    /// Prepend `prefix` to the input text unless it is already there
    pub fn prefix_input(&mut self, prefix: &str) {
        let prefix = prefix.trim_end();
        if !self.input_text.starts_with(prefix) {
            self.input_text = format!("{} {}", prefix, self.input_text);
        }
    }
}
