//! Title table loading.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::models::TitleRecord;

/// Read the whole title table into memory.
///
/// Columns are matched by header name (`tconst` or `title_id`, `director`,
/// `cast`); extra columns are ignored and every value stays a string.
pub fn load_titles(path: &Path) -> Result<Vec<TitleRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_path(path)?;

    let mut titles = Vec::new();
    for row in reader.deserialize::<TitleRecord>() {
        titles.push(row?);
    }

    info!("Loaded {} titles from {}", titles.len(), path.display());
    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_titles_keeps_strings_and_missing_cast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("titles.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "tconst,director,cast,year").unwrap();
        writeln!(file, "tt0111161,Frank Darabont,\"Tim Robbins, Morgan Freeman\",1994").unwrap();
        writeln!(file, "tt0000001,,,1890").unwrap();
        writeln!(file, "0012345,Someone,Solo Actor,2001").unwrap();
        drop(file);

        let titles = load_titles(&path).unwrap();
        assert_eq!(titles.len(), 3);
        assert_eq!(titles[0].cast_hint().unwrap().len(), 2);
        assert_eq!(titles[1].director, None);
        assert!(titles[1].cast_hint().is_err());
        // Numeric-looking ids are not coerced
        assert_eq!(titles[2].title_id, "0012345");
    }

    #[test]
    fn test_load_titles_accepts_title_id_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("titles.csv");
        std::fs::write(&path, "title_id,director,cast\ntt1,Dir,A\n").unwrap();

        let titles = load_titles(&path).unwrap();
        assert_eq!(titles[0].title_id, "tt1");
    }
}
