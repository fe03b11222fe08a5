//! Title rows read from the input table.

use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// One row of the input table.
///
/// Every column is kept as a string; the cast column is split lazily so a
/// bad row only costs that row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRecord {
    #[serde(rename = "tconst", alias = "title_id")]
    pub title_id: String,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub cast: Option<String>,
}

impl TitleRecord {
    pub fn new(title_id: impl Into<String>, director: Option<&str>, cast: Option<&str>) -> Self {
        Self {
            title_id: title_id.into(),
            director: director.map(str::to_string),
            cast: cast.map(str::to_string),
        }
    }

    /// Split the comma-separated cast column into names.
    ///
    /// A missing column or one with no names is a malformed record.
    pub fn cast_hint(&self) -> Result<Vec<String>, CrawlError> {
        let raw = self
            .cast
            .as_deref()
            .ok_or_else(|| CrawlError::MalformedRecord {
                title_id: self.title_id.clone(),
                reason: "missing cast column".to_string(),
            })?;

        let names: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(CrawlError::MalformedRecord {
                title_id: self.title_id.clone(),
                reason: format!("cast column {:?} has no names", raw),
            });
        }

        Ok(names)
    }
}

/// A title scheduled for discovery: its page URL plus the cast hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleTarget {
    pub row: usize,
    pub title_id: String,
    pub url: String,
    pub cast_hint: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_hint_splits_and_trims() {
        let record = TitleRecord::new("tt0111161", Some("Frank Darabont"), Some("Tim Robbins, Morgan Freeman"));
        assert_eq!(
            record.cast_hint().unwrap(),
            vec!["Tim Robbins".to_string(), "Morgan Freeman".to_string()]
        );
    }

    #[test]
    fn test_cast_hint_missing_is_malformed() {
        let record = TitleRecord::new("tt0000001", None, None);
        assert!(matches!(
            record.cast_hint(),
            Err(CrawlError::MalformedRecord { title_id, .. }) if title_id == "tt0000001"
        ));
    }

    #[test]
    fn test_cast_hint_blank_is_malformed() {
        let record = TitleRecord::new("tt0000002", None, Some(" , "));
        assert!(record.cast_hint().is_err());
    }
}
