//! Starring cast extraction from a title page anchor.

use scraper::{ElementRef, Html, Selector};

use super::elements_after;
use crate::models::CastLink;

/// Collect the links in the container that follows the cast label.
///
/// The label is a link whose whole text equals `label_text`; the container
/// is the next `container_tag` element after it in document order. Either
/// one missing yields an empty list.
pub fn extract_cast(
    doc: &Html,
    link_selector: &Selector,
    label_text: &str,
    container_tag: &str,
) -> Vec<CastLink> {
    let Some(label) = doc
        .select(link_selector)
        .find(|a| element_text(a) == label_text)
    else {
        return Vec::new();
    };

    let Some(container) = elements_after(doc, label).find(|e| e.value().name() == container_tag)
    else {
        return Vec::new();
    };

    container
        .select(link_selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(CastLink {
                name: element_text(&a),
                href: href.to_string(),
            })
        })
        .collect()
}

/// The actor id in a profile href: the segment after `/name/`.
///
/// `/name/nm0000209/?ref_=tt_ov_st_1` gives `nm0000209`.
pub fn actor_id_from_href(href: &str) -> Option<String> {
    let path = match url::Url::parse(href) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => href.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    path.split('/')
        .nth(2)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
