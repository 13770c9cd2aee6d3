use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub original_title: String,
    pub year: String,
    pub rating: f64,
    pub poster: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub language_status: LanguageStatus,
    pub genre: Vec<String>,
    pub description: String,
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Movie {
    /// Placeholder poster keyed by id, used when `poster` is not a usable URL.
    pub fn poster_or_placeholder(&self) -> String {
        match url::Url::parse(&self.poster) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => self.poster.clone(),
            _ => format!("https://picsum.photos/seed/{}/400/600", urlencoding::encode(&self.id)),
        }
    }
}

/// A movie persisted in a collection, stamped with its last write time
/// in Unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMovie {
    #[serde(flatten)]
    pub movie: Movie,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Series,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageStatus {
    Subtitled,
    Dubbed,
    #[default]
    Original,
}

/// The two fixed persisted collections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    History,
    Watchlist,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::History, Collection::Watchlist];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::History => "history",
            Collection::Watchlist => "watchlist",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FilterLanguage {
    #[default]
    All,
    Subtitled,
    Dubbed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FilterType {
    #[default]
    All,
    Movie,
    Series,
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub language: FilterLanguage,
    pub media_type: FilterType,
}

#[cfg(test)]
pub(crate) fn sample_movie(id: &str, title: &str) -> Movie {
    Movie {
        id: id.to_string(),
        title: title.to_string(),
        original_title: title.to_string(),
        year: "2024".to_string(),
        rating: 7.5,
        poster: "https://image.example.org/poster.jpg".to_string(),
        media_type: MediaType::Movie,
        language_status: LanguageStatus::Subtitled,
        genre: vec!["Drama".to_string()],
        description: "A test movie".to_string(),
        quality: "1080p".to_string(),
        duration: None,
        sources: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_movie_flattens_fields() {
        let stored = StoredMovie {
            movie: sample_movie("m1", "Dune"),
            timestamp: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["id"], "m1");
        assert_eq!(value["originalTitle"], "Dune");
        assert_eq!(value["type"], "movie");
        assert_eq!(value["languageStatus"], "subtitled");
        assert_eq!(value["timestamp"], 1_700_000_000_000i64);

        let back: StoredMovie = serde_json::from_value(value).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn test_poster_placeholder_for_invalid_url() {
        let mut movie = sample_movie("m 1", "Dune");
        movie.poster = "not a url".to_string();
        assert_eq!(
            movie.poster_or_placeholder(),
            "https://picsum.photos/seed/m%201/400/600"
        );
    }
}
