use crate::error::{CinemaError, Result};
use crate::http::HttpClient;
use crate::models::{FilterLanguage, FilterType, Movie, SearchParams};
use crate::normalizer;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

const MIN_KEY_LENGTH: usize = 10;

pub struct GeminiClient {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
    result_count: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct WebChunk {
    uri: Option<String>,
}

/// What we can tell about the configured key without calling the service.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDiagnostics {
    Missing,
    InvalidLength { length: usize },
    Detected { masked: String, length: usize },
}

impl GeminiClient {
    pub fn new(http: HttpClient, api_key: Option<String>, model: String, base_url: String, result_count: u32) -> Self {
        Self {
            http,
            api_key,
            model,
            base_url,
            result_count,
        }
    }

    pub fn diagnostics(&self) -> KeyDiagnostics {
        diagnose_key(self.api_key.as_deref())
    }

    fn usable_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if key.chars().count() >= MIN_KEY_LENGTH => Ok(key),
            _ => Err(CinemaError::CredentialMissing),
        }
    }

    #[instrument(skip(self), fields(query = %params.query))]
    pub async fn search_movies(&self, params: &SearchParams) -> Result<Vec<Movie>> {
        let key = self.usable_key()?;
        info!("Searching for \"{}\" with {}", params.query, self.model);

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": self.build_prompt(params) }] }],
            "tools": [{ "google_search": {} }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let headers = [("x-goog-api-key", key)];
        let response: GenerateContentResponse = match self.http.post_json(&url, &headers, &body).await {
            Ok(response) => response,
            Err(e) => {
                error!("Gemini request failed: {}", e);
                return Err(e);
            }
        };

        let (text, grounding) = extract_reply(response);
        debug!("Received {} chars and {} grounding links", text.len(), grounding.len());

        let movies = normalizer::normalize_response(&text, &grounding)?;
        info!("Retrieved {} movies", movies.len());
        Ok(movies)
    }

    /// Trending titles for the landing view; failures yield an empty list.
    pub async fn featured_movies(&self) -> Vec<Movie> {
        let params = SearchParams {
            query: "trending movies 2024".to_string(),
            language: FilterLanguage::All,
            media_type: FilterType::All,
        };
        match self.search_movies(&params).await {
            Ok(movies) => movies,
            Err(e) => {
                warn!("Featured movies unavailable: {}", e);
                Vec::new()
            }
        }
    }

    fn build_prompt(&self, params: &SearchParams) -> String {
        let kind = match params.media_type {
            FilterType::All => "movies or series",
            FilterType::Movie => "movies",
            FilterType::Series => "series",
        };
        let language = match params.language {
            FilterLanguage::All => "any",
            FilterLanguage::Subtitled => "subtitled in Arabic",
            FilterLanguage::Dubbed => "dubbed in Arabic",
        };
        format!(
            "Find {kind} matching the name \"{query}\". Language availability: {language}.\n\
             Answer with JSON only: an array of {count} objects, each with \
             id, title, originalTitle, year, rating, poster, type (movie|series), \
             languageStatus (subtitled|dubbed|original), genre (array), description, quality, \
             and sources (array of direct watch page URLs found on the web).",
            kind = kind,
            query = params.query,
            language = language,
            count = self.result_count,
        )
    }
}

fn extract_reply(response: GenerateContentResponse) -> (String, Vec<String>) {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return ("[]".to_string(), Vec::new());
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = if text.trim().is_empty() { "[]".to_string() } else { text };

    let grounding: Vec<String> = candidate
        .grounding_metadata
        .map(|g| {
            g.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web.and_then(|w| w.uri))
                .collect()
        })
        .unwrap_or_default();

    (text, grounding)
}

pub fn diagnose_key(key: Option<&str>) -> KeyDiagnostics {
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return KeyDiagnostics::Missing;
    };
    let length = key.chars().count();
    if length < MIN_KEY_LENGTH {
        return KeyDiagnostics::InvalidLength { length };
    }

    let head: String = key.chars().take(4).collect();
    let tail: String = key.chars().skip(length - 3).collect();
    KeyDiagnostics::Detected {
        masked: format!("{}...{}", head, tail),
        length,
    }
}
