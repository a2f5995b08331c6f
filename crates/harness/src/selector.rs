//! Element selectors and locators
//!
//! Selectors use the Playwright string conventions the probes were written
//! against: `text=/pattern/flags` selects visible elements by their text, any
//! other string is handed to `querySelectorAll` as CSS.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProbeError, ProbeResult};

/// How to find elements on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS / attribute selector, possibly a comma-separated group
    Css(String),

    /// Visible elements whose text matches a regex
    TextPattern {
        source: String,
        case_insensitive: bool,
    },
}

impl Selector {
    /// Create a CSS selector
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a case-insensitive text pattern selector
    pub fn text_pattern(source: impl Into<String>) -> ProbeResult<Self> {
        let source = source.into();
        compile_pattern(&source, true)?;
        Ok(Self::TextPattern {
            source,
            case_insensitive: true,
        })
    }

    /// Parse a Playwright-style selector string
    pub fn parse(raw: &str) -> ProbeResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProbeError::InvalidSelector("empty selector".to_string()));
        }

        if let Some(rest) = raw.strip_prefix("text=") {
            let rest = rest.trim();
            if let Some(body) = rest.strip_prefix('/') {
                let end = body.rfind('/').ok_or_else(|| {
                    ProbeError::InvalidSelector(format!("unterminated text pattern: {}", raw))
                })?;
                let (source, flags) = (&body[..end], &body[end + 1..]);
                if source.is_empty() {
                    return Err(ProbeError::InvalidSelector(format!("empty text pattern: {}", raw)));
                }
                if let Some(bad) = flags.chars().find(|c| *c != 'i') {
                    return Err(ProbeError::InvalidSelector(format!(
                        "unsupported text pattern flag '{}' in {}",
                        bad, raw
                    )));
                }
                let case_insensitive = flags.contains('i');
                compile_pattern(source, case_insensitive)?;
                return Ok(Self::TextPattern {
                    source: source.to_string(),
                    case_insensitive,
                });
            }

            // Plain `text=foo` is a case-insensitive substring match
            return Self::text_pattern(regex::escape(rest.trim_matches('"')));
        }

        Ok(Self::Css(raw.to_string()))
    }

    /// Compile the text pattern, if this is one
    pub fn regex(&self) -> Option<Regex> {
        match self {
            Self::Css(_) => None,
            Self::TextPattern {
                source,
                case_insensitive,
            } => compile_pattern(source, *case_insensitive).ok(),
        }
    }

    /// Whether `text` matches this selector's pattern (CSS selectors never match text)
    pub fn matches_text(&self, text: &str) -> bool {
        self.regex().map(|re| re.is_match(text)).unwrap_or(false)
    }

    /// JavaScript expression evaluating to the array of matched elements
    pub fn to_js_query(&self) -> String {
        match self {
            Self::Css(css) => {
                format!("Array.from(document.querySelectorAll({}))", js_string(css))
            }
            Self::TextPattern {
                source,
                case_insensitive,
            } => {
                let flags = if *case_insensitive { "i" } else { "" };
                // Deepest visible elements whose text matches, like Playwright's text engine
                format!(
                    r#"(() => {{
    const re = new RegExp({source}, {flags});
    const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    const root = document.body || document.documentElement;
    if (!root) return [];
    return Array.from(root.querySelectorAll('*')).filter((el) =>
        visible(el) &&
        re.test(el.innerText || el.textContent || '') &&
        !Array.from(el.children).some((c) => re.test(c.innerText || c.textContent || ''))
    );
}})()"#,
                    source = js_string(source),
                    flags = js_string(flags),
                )
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => f.write_str(css),
            Self::TextPattern {
                source,
                case_insensitive,
            } => write!(f, "text=/{}/{}", source, if *case_insensitive { "i" } else { "" }),
        }
    }
}

impl FromStr for Selector {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A selector narrowed to an optional match index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub selector: Selector,
    pub nth: Option<usize>,
}

impl Locator {
    pub fn new(selector: Selector) -> Self {
        Self { selector, nth: None }
    }

    /// Narrow to the first match
    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Narrow to the match at `index`
    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    /// Index to act on, once the total number of matches is known
    pub fn index_within(&self, count: usize) -> Option<usize> {
        match self.nth {
            Some(i) if i < count => Some(i),
            Some(_) => None,
            None if count > 0 => Some(0),
            None => None,
        }
    }

    /// Number of elements this locator resolves to given the raw match count
    pub fn resolved_count(&self, count: usize) -> usize {
        match self.nth {
            Some(i) => usize::from(i < count),
            None => count,
        }
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::new(selector)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.nth {
            Some(0) => write!(f, "{} >> first", self.selector),
            Some(i) => write!(f, "{} >> nth={}", self.selector, i),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// Result of `locate`: the locator and the raw match count observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub locator: Locator,
    pub count: usize,
}

impl Located {
    /// Elements the locator resolves to, after applying `nth`
    pub fn resolved(&self) -> usize {
        self.locator.resolved_count(self.count)
    }

    pub fn is_present(&self) -> bool {
        self.resolved() > 0
    }
}

/// Reject syntax the `regex` crate accepts but a browser `RegExp` (no `u`
/// flag) throws on or reads differently.
fn check_browser_dialect(source: &str) -> ProbeResult<()> {
    let unsupported = |what: &str| -> ProbeResult<()> {
        Err(ProbeError::InvalidSelector(format!(
            "text pattern '{}' uses {}, which browsers do not support",
            source, what
        )))
    };

    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                match chars.get(i + 1) {
                    Some('A') | Some('z') | Some('Z') => return unsupported("a text anchor (\\A, \\z)"),
                    Some('p') | Some('P') => return unsupported("a Unicode class (\\p)"),
                    _ => {}
                }
                i += 2;
                continue;
            }
            '[' if chars.get(i + 1) == Some(&'[') && chars.get(i + 2) == Some(&':') => {
                return unsupported("a POSIX class ([[:name:]])");
            }
            '(' if chars.get(i + 1) == Some(&'?') => match chars.get(i + 2) {
                // Non-capturing, lookaround and (?<name>) groups
                Some(':') | Some('=') | Some('!') | Some('<') => {}
                Some('P') => return unsupported("a (?P<name>) group"),
                _ => return unsupported("inline flags"),
            },
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

fn compile_pattern(source: &str, case_insensitive: bool) -> ProbeResult<Regex> {
    check_browser_dialect(source)?;
    RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| ProbeError::InvalidSelector(format!("bad text pattern '{}': {}", source, e)))
}

/// Quote a string as a JavaScript literal
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
