//! Selector configuration for a site profile.

use serde::{Deserialize, Serialize};

/// Everything site-specific the crawler needs, as data.
///
/// Defaults target IMDb title and name pages. Any field can be overridden
/// from the `[selectors]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Prefix joined with a title id to form the title page URL.
    pub title_base_url: String,
    /// Origin joined with relative cast hrefs.
    pub site_base_url: String,
    /// Anchor waited for on a title page.
    pub discovery_anchor: String,
    /// Anchor waited for on a profile page.
    pub enrichment_anchor: String,
    /// Text of the link labelling the starring cast.
    pub cast_label_text: String,
    /// Tag of the container following the label.
    pub cast_container_tag: String,
    /// Element holding the current rank text.
    pub rank_selector: String,
    /// Rank text meaning no rank has been assigned yet (case-insensitive).
    pub rank_sentinel: String,
    /// Icon present when the rank went down.
    pub trend_down_selector: String,
    /// Icon present when the rank went up.
    pub trend_up_selector: String,
    /// Tag of the elements after the trend icon.
    pub magnitude_tag: String,
    /// Which following element holds the change magnitude (0-based).
    pub magnitude_offset: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title_base_url: "https://www.imdb.com/title/".to_string(),
            site_base_url: "https://www.imdb.com".to_string(),
            discovery_anchor: ".ipc-metadata-list__item:last-of-type".to_string(),
            enrichment_anchor: ".starmeter-content".to_string(),
            cast_label_text: "Stars".to_string(),
            cast_container_tag: "div".to_string(),
            rank_selector: "span.starmeter-current-rank".to_string(),
            rank_sentinel: "see rank".to_string(),
            trend_down_selector: ".ipc-icon--popularity-down".to_string(),
            trend_up_selector: ".ipc-icon--popularity-up".to_string(),
            magnitude_tag: "span".to_string(),
            magnitude_offset: 1,
        }
    }
}

impl SelectorConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
