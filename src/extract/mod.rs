//! Extraction of cast lists and popularity ratings from anchor markup.
//!
//! The crawler is parameterized by a [`SiteProfile`]; the shipped
//! [`SelectorProfile`] is driven entirely by a [`SelectorConfig`].

mod cast;
mod rating;
mod selectors;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

pub use cast::{actor_id_from_href, extract_cast};
pub use rating::{extract_rating, parse_rank, RatingSelectors};
pub use selectors::SelectorConfig;

use crate::browser::AnchorSelectors;
use crate::error::CrawlError;
use crate::models::{CastEntry, CastLink, Rating};

/// Site-specific behavior of the crawler.
pub trait SiteProfile: Send + Sync {
    /// Anchor selectors for both fetch operations.
    fn anchors(&self) -> AnchorSelectors;

    /// Page URL for a title id.
    fn title_url(&self, title_id: &str) -> String;

    /// Cast links on a title page anchor.
    fn extract_cast(&self, doc: &Html) -> Vec<CastLink>;

    /// Rank and change on a profile page anchor.
    fn extract_rating(&self, doc: &Html) -> Rating;

    /// Turn a cast link into a fresh entry, or `None` if it carries no id.
    fn resolve_cast_link(&self, link: &CastLink) -> Option<CastEntry>;
}

/// A [`SiteProfile`] built from selector data.
#[derive(Debug, Clone)]
pub struct SelectorProfile {
    config: SelectorConfig,
    cast_label: Selector,
    rating: RatingSelectors,
}

impl SelectorProfile {
    /// Compile the selectors in `config`.
    pub fn new(config: SelectorConfig) -> Result<Self, CrawlError> {
        let rating = RatingSelectors {
            rank: compile(&config.rank_selector)?,
            trend_down: compile(&config.trend_down_selector)?,
            trend_up: compile(&config.trend_up_selector)?,
            magnitude_tag: config.magnitude_tag.clone(),
            magnitude_offset: config.magnitude_offset,
            sentinel: config.rank_sentinel.clone(),
        };
        // Validate the anchors too, even though the browser evaluates them.
        compile(&config.discovery_anchor)?;
        compile(&config.enrichment_anchor)?;

        Ok(Self {
            cast_label: compile("a")?,
            rating,
            config,
        })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }
}

impl SiteProfile for SelectorProfile {
    fn anchors(&self) -> AnchorSelectors {
        AnchorSelectors {
            discovery: self.config.discovery_anchor.clone(),
            enrichment: self.config.enrichment_anchor.clone(),
        }
    }

    fn title_url(&self, title_id: &str) -> String {
        format!("{}{}", self.config.title_base_url, title_id.trim())
    }

    fn extract_cast(&self, doc: &Html) -> Vec<CastLink> {
        extract_cast(
            doc,
            &self.cast_label,
            &self.config.cast_label_text,
            &self.config.cast_container_tag,
        )
    }

    fn extract_rating(&self, doc: &Html) -> Rating {
        extract_rating(doc, &self.rating)
    }

    fn resolve_cast_link(&self, link: &CastLink) -> Option<CastEntry> {
        let Some(actor_id) = actor_id_from_href(&link.href) else {
            warn!("Cast link {:?} has no actor id: {}", link.name, link.href);
            return None;
        };
        let profile_url = if link.href.starts_with("http://") || link.href.starts_with("https://") {
            link.href.clone()
        } else {
            format!("{}{}", self.config.site_base_url, link.href)
        };
        Some(CastEntry::new(link.name.trim(), actor_id, profile_url))
    }
}

fn compile(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector)
        .map_err(|e| CrawlError::Other(format!("invalid selector {:?}: {}", selector, e)))
}

/// Elements after `start` in document order, its own descendants included.
pub(crate) fn elements_after<'a>(
    doc: &'a Html,
    start: ElementRef<'a>,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let start_id = start.id();
    doc.tree
        .root()
        .descendants()
        .skip_while(move |node| node.id() != start_id)
        .skip(1)
        .filter_map(ElementRef::wrap)
}
