//! Ways of switching a product capability on before a probe submits
//!
//! The same capability has been exposed as a menu entry, as a keyword typed
//! in front of the prompt and as a side effect of the selected model. A probe
//! picks one strategy; the session does not care which.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::error::ProbeResult;
use crate::request::ProbeRequest;
use crate::selector::{Locator, Selector};
use crate::session::{ActionOutcome, Session};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Activation {
    /// Click `trigger` to open a menu, then click `item`
    Menu { trigger: Selector, item: Selector },

    /// Prefix the prompt, e.g. `Deep research:`
    KeywordPrefix { prefix: String },

    /// Capability comes with the model selected through the URL
    Model { model: String },
}

impl Activation {
    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            Activation::Menu { item, .. } => format!("menu item {}", item),
            Activation::KeywordPrefix { prefix } => format!("keyword prefix '{}'", prefix),
            Activation::Model { model } => format!("model {}", model),
        }
    }

    /// Whether activating leaves anything on the page worth a screenshot
    pub fn changes_page(&self) -> bool {
        matches!(self, Activation::Menu { .. })
    }

    /// Try to switch the capability on. `false` means it could not be
    /// confirmed; whether that fails the probe is up to the caller.
    pub async fn activate(
        &self,
        session: &mut Session,
        request: &mut ProbeRequest,
    ) -> ProbeResult<bool> {
        let activated = match self {
            Activation::Menu { trigger, item } => {
                let trigger = Locator::new(trigger.clone()).first();
                let item = Locator::new(item.clone()).first();

                match session.click_if_ready(&trigger).await? {
                    ActionOutcome::Acted => {}
                    other => {
                        warn!("Menu trigger {} not usable: {:?}", trigger, other);
                        return Ok(false);
                    }
                }

                // The menu renders after the click
                let located = session.locate(&item, None).await?;
                if !located.is_present() {
                    warn!("Menu item {} did not appear", item);
                    return Ok(false);
                }
                session.click_if_ready(&item).await?.acted()
            }
            Activation::KeywordPrefix { prefix } => {
                request.prefix_input(prefix);
                true
            }
            Activation::Model { model } => {
                let current = session.current_url().await?;
                current
                    .as_deref()
                    .map(|url| url_selects_model(url, model))
                    .unwrap_or(false)
            }
        };

        info!("Activation via {}: {}", self.describe(), activated);
        Ok(activated)
    }
}

/// Whether `url` carries `model=<model>` in its query
pub fn url_selects_model(url: &str, model: &str) -> bool {
    Url::parse(url)
        .map(|url| url.query_pairs().any(|(k, v)| k == "model" && v == model))
        .unwrap_or(false)
}
