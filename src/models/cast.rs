//! Cast entries and popularity ratings.

use serde::{Deserialize, Serialize};

/// A link to a cast member's profile as it appears on a title page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastLink {
    pub name: String,
    pub href: String,
}

/// Direction of a popularity rank change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// Apply the direction to an unsigned magnitude.
    pub fn signed(self, magnitude: i64) -> i64 {
        match self {
            Trend::Up => magnitude,
            Trend::Down => -magnitude,
        }
    }
}

/// Popularity rank and its change; both unset when not yet available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rating {
    pub rank: Option<u64>,
    pub delta: Option<i64>,
}

impl Rating {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.rank.is_some()
    }
}

/// One cast member of one title.
///
/// Field names on disk follow the checkpoint table columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastEntry {
    #[serde(rename = "actor")]
    pub actor_name: String,
    #[serde(rename = "nconst")]
    pub actor_id: String,
    #[serde(rename = "url")]
    pub profile_url: String,
    #[serde(rename = "rating")]
    pub rank: Option<u64>,
    #[serde(rename = "ratingChange")]
    pub rank_delta: Option<i64>,
}

impl CastEntry {
    /// Create an entry from discovery; rating fields start unset.
    pub fn new(
        actor_name: impl Into<String>,
        actor_id: impl Into<String>,
        profile_url: impl Into<String>,
    ) -> Self {
        Self {
            actor_name: actor_name.into(),
            actor_id: actor_id.into(),
            profile_url: profile_url.into(),
            rank: None,
            rank_delta: None,
        }
    }

    pub fn is_ranked(&self) -> bool {
        self.rank.is_some()
    }

    pub fn apply_rating(&mut self, rating: Rating) {
        self.rank = rating.rank;
        self.rank_delta = rating.delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_signed() {
        assert_eq!(Trend::Up.signed(56), 56);
        assert_eq!(Trend::Down.signed(12), -12);
    }

    #[test]
    fn test_apply_rating() {
        let mut entry = CastEntry::new("Tim Robbins", "nm0000209", "https://www.imdb.com/name/nm0000209/");
        assert!(!entry.is_ranked());
        entry.apply_rating(Rating {
            rank: Some(1234),
            delta: Some(-12),
        });
        assert!(entry.is_ranked());
        assert_eq!(entry.rank_delta, Some(-12));
    }
}
