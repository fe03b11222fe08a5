//! Popularity rank extraction from a profile page anchor.

use scraper::{Html, Selector};

use super::elements_after;
use crate::models::{Rating, Trend};

/// Compiled selectors and rules for [`extract_rating`].
#[derive(Debug, Clone)]
pub struct RatingSelectors {
    pub rank: Selector,
    pub trend_down: Selector,
    pub trend_up: Selector,
    pub magnitude_tag: String,
    pub magnitude_offset: usize,
    pub sentinel: String,
}

/// Read the current rank and its signed change.
///
/// Anything missing (rank element, trend icon, magnitude element, a number
/// that does not parse) means the rating is not available yet.
pub fn extract_rating(doc: &Html, rules: &RatingSelectors) -> Rating {
    let Some(rank_element) = doc.select(&rules.rank).next() else {
        return Rating::unavailable();
    };
    let rank_text: String = rank_element.text().collect();
    let Some(rank) = parse_rank(&rank_text, &rules.sentinel) else {
        return Rating::unavailable();
    };

    let (trend, icon) = match doc.select(&rules.trend_down).next() {
        Some(icon) => (Trend::Down, icon),
        None => match doc.select(&rules.trend_up).next() {
            Some(icon) => (Trend::Up, icon),
            None => return Rating::unavailable(),
        },
    };

    let Some(magnitude) = elements_after(doc, icon)
        .filter(|e| e.value().name() == rules.magnitude_tag)
        .nth(rules.magnitude_offset)
        .and_then(|e| parse_number(&e.text().collect::<String>()))
    else {
        return Rating::unavailable();
    };

    Rating {
        rank: Some(rank),
        delta: Some(trend.signed(magnitude.abs())),
    }
}

/// Parse rank text such as `1,234` or `Top 5,000`.
///
/// Returns `None` for the no-rank sentinel or when no token is a number.
pub fn parse_rank(text: &str, sentinel: &str) -> Option<u64> {
    let text = text.trim();
    if text.eq_ignore_ascii_case(sentinel) {
        return None;
    }
    text.split_whitespace()
        .find_map(|token| token.replace(',', "").parse::<u64>().ok())
}

fn parse_number(text: &str) -> Option<i64> {
    text.split_whitespace()
        .find_map(|token| token.replace(',', "").parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RatingSelectors {
        RatingSelectors {
            rank: Selector::parse("span.starmeter-current-rank").unwrap(),
            trend_down: Selector::parse(".ipc-icon--popularity-down").unwrap(),
            trend_up: Selector::parse(".ipc-icon--popularity-up").unwrap(),
            magnitude_tag: "span".to_string(),
            magnitude_offset: 1,
            sentinel: "see rank".to_string(),
        }
    }

    fn meter(rank: &str, icon: &str, magnitude: &str) -> String {
        format!(
            r#"<div class="starmeter-content">
                 <span class="starmeter-current-rank">{rank}</span>
                 <span class="starmeter-difference">
                   <svg class="ipc-icon {icon}" viewBox="0 0 24 24"><path d="M0 0h24v24H0z"></path></svg>
                   <span class="starmeter-label">change</span><span>{magnitude}</span>
                 </span>
               </div>"#
        )
    }

    fn rating(markup: &str) -> Rating {
        extract_rating(&Html::parse_fragment(markup), &rules())
    }

    #[test]
    fn test_see_rank_is_unavailable() {
        let markup = r#"<div class="starmeter-content"><span class="starmeter-current-rank">See Rank</span></div>"#;
        assert_eq!(rating(markup), Rating::unavailable());
    }

    #[test]
    fn test_rank_trending_up() {
        let r = rating(&meter("1,234", "ipc-icon--popularity-up", "56"));
        assert_eq!(r.rank, Some(1234));
        assert_eq!(r.delta, Some(56));
    }

    #[test]
    fn test_rank_trending_down() {
        let r = rating(&meter("87", "ipc-icon--popularity-down", "12"));
        assert_eq!(r.rank, Some(87));
        assert_eq!(r.delta, Some(-12));
    }

    #[test]
    fn test_missing_trend_icon_is_unavailable() {
        let markup = r#"<div class="starmeter-content"><span class="starmeter-current-rank">15</span><span>3</span></div>"#;
        assert_eq!(rating(markup), Rating::unavailable());
    }

    #[test]
    fn test_missing_magnitude_is_unavailable() {
        let markup = r#"<div><span class="starmeter-current-rank">15</span>
            <svg class="ipc-icon--popularity-up"></svg><span>only one</span></div>"#;
        assert_eq!(rating(markup), Rating::unavailable());
    }

    #[test]
    fn test_missing_rank_element_is_unavailable() {
        assert_eq!(rating("<div class=\"starmeter-content\"></div>"), Rating::unavailable());
    }

    #[test]
    fn test_parse_rank() {
        assert_eq!(parse_rank("1,234", "see rank"), Some(1234));
        assert_eq!(parse_rank("Top 5,000", "see rank"), Some(5000));
        assert_eq!(parse_rank("  SEE RANK ", "see rank"), None);
        assert_eq!(parse_rank("n/a", "see rank"), None);
    }
}
