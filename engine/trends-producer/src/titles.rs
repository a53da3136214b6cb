//! Tracked title list

use anyhow::{Context, Result};
use franchise_core::config::ProducerConfig;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Used when neither `TRACKED_TITLES` nor `SHOWS_LIST_FILE` is configured
pub const CURATED_TITLES: &[&str] = &[
    "Stranger Things", "Squid Game", "The Crown", "Bridgerton", "The Witcher",
    "Money Heist", "Dark", "Ozark", "Black Mirror", "The Queen's Gambit",
    "House of Cards", "Mindhunter", "Narcos", "Peaky Blinders", "Better Call Saul",
    "Breaking Bad", "Friends", "The Office", "Seinfeld", "Community",
    "Gilmore Girls", "Grey's Anatomy", "Supernatural", "NCIS", "Shameless",
    "Attack on Titan", "Demon Slayer: Kimetsu no Yaiba", "One Piece", "Death Note",
    "Hunter X Hunter (2011)", "Avatar: The Last Airbender", "Arcane", "Rick and Morty",
    "BoJack Horseman", "Big Mouth", "Sex Education", "Emily in Paris", "Lupin",
    "Shadow and Bone", "Sweet Tooth", "Cobra Kai", "Lucifer", "Manifest",
    "You", "Ginny & Georgia", "Firefly Lane", "Outer Banks", "Virgin River",
    "The Umbrella Academy", "Locke & Key", "Maid", "Midnight Mass",
    "Never Have I Ever", "The Haunting of Bly Manor", "Wednesday", "Dead to Me",
    "Tiger King", "Love Is Blind", "Russian Doll", "Kingdom", "Alice in Borderland",
    "Crash Landing on You", "Elite", "3%", "Fauda", "Sacred Games", "Delhi Crime",
    "The Great British Baking Show", "Queer Eye", "Selling Sunset", "Too Hot to Handle",
    "The Circle", "Chef's Table", "Street Food", "Nailed It!",
];

/// Resolve the tracked titles: explicit list, else list file, else the curated list.
///
/// Titles are trimmed, blanks and duplicates dropped (first occurrence wins)
/// and the result truncated to `num_shows`.
pub fn load_titles(config: &ProducerConfig) -> Result<Vec<String>> {
    if !config.tracked_titles.is_empty() {
        info!("Using {} titles from TRACKED_TITLES", config.tracked_titles.len());
        return Ok(normalize_titles(config.tracked_titles.iter().map(String::as_str), config.num_shows));
    }

    if let Some(path) = &config.shows_list_file {
        let titles = read_titles_file(path)?;
        info!("Loaded {} titles from {:?}", titles.len(), path);
        return Ok(titles.into_iter().take(config.num_shows).collect());
    }

    info!("Using built-in curated title list");
    Ok(normalize_titles(CURATED_TITLES.iter().copied(), config.num_shows))
}

/// One title per line; blank lines and `#` comments ignored
pub fn read_titles_file(path: &Path) -> Result<Vec<String>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read shows list: {path:?}"))?;
    let lines = content.lines().filter(|line| !line.trim_start().starts_with('#'));
    Ok(normalize_titles(lines, usize::MAX))
}

pub fn normalize_titles<'a, I>(titles: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    titles
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// Split titles into upstream request batches of at most `batch_size`
pub fn chunk_titles(titles: &[String], batch_size: usize) -> Vec<Vec<String>> {
    titles.chunks(batch_size.max(1)).map(<[String]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_explicit_titles_win() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "From File").unwrap();
        let config = ProducerConfig {
            tracked_titles: vec!["A".to_string(), " B ".to_string(), "A".to_string()],
            shows_list_file: Some(file.path().to_path_buf()),
            ..ProducerConfig::default()
        };

        assert_eq!(load_titles(&config).unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_titles_file_truncated_to_num_shows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# header\nOne\n\nTwo\nOne\nThree").unwrap();
        let config = ProducerConfig {
            shows_list_file: Some(file.path().to_path_buf()),
            num_shows: 2,
            ..ProducerConfig::default()
        };

        assert_eq!(load_titles(&config).unwrap(), vec!["One", "Two"]);
    }

    #[test]
    fn test_missing_titles_file_is_an_error() {
        let config = ProducerConfig {
            shows_list_file: Some("/nonexistent/shows_list.txt".into()),
            ..ProducerConfig::default()
        };

        assert!(load_titles(&config).is_err());
    }

    #[test]
    fn test_curated_list_has_no_duplicates() {
        let config = ProducerConfig { num_shows: 10_000, ..ProducerConfig::default() };
        let titles = load_titles(&config).unwrap();
        assert_eq!(titles.len(), CURATED_TITLES.len());
        assert_eq!(titles[0], "Stranger Things");
    }

    #[test]
    fn test_chunking() {
        let titles: Vec<String> = (0..12).map(|i| format!("T{i}")).collect();
        let batches = chunk_titles(&titles, 5);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(batches[2], vec!["T10", "T11"]);
    }
}
