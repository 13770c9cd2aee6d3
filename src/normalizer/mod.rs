use crate::error::{CinemaError, Result};
use crate::models::{LanguageStatus, MediaType, Movie};
use crate::sources::{self, TrustLevel};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

const FALLBACK_SEARCH_URL: &str = "https://www.google.com/search?q=";
const MIN_RELEVANCE: f64 = 0.5;

const BLOCKED_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "fb.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "reddit.com",
    "pinterest.com",
    "bing.com",
    "duckduckgo.com",
];

const LISTING_SEGMENTS: &[&str] = &[
    "search", "tag", "tags", "category", "categories", "genre", "genres", "page", "list", "lists",
    "browse",
];

const SEARCH_QUERY_KEYS: &[&str] = &["s", "q", "search", "query"];

const STOP_WORDS: &[&str] = &["the", "and", "of"];

/// A candidate record as the generator sent it. Every field is optional and
/// loosely typed; nothing here is trusted until [`normalize`] has run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMovie {
    pub id: Option<Value>,
    pub title: Option<Value>,
    pub original_title: Option<Value>,
    pub year: Option<Value>,
    pub rating: Option<Value>,
    pub poster: Option<Value>,
    #[serde(rename = "type")]
    pub media_type: Option<Value>,
    pub language_status: Option<Value>,
    pub genre: Option<Value>,
    pub description: Option<Value>,
    pub quality: Option<Value>,
    pub duration: Option<Value>,
    #[serde(alias = "links")]
    pub sources: Option<Value>,
}

/// Parses the generator's reply into raw records.
///
/// Accepts a bare array or an object wrapping one under `movies` or
/// `results`, optionally inside a Markdown code fence. Elements that are not
/// objects are dropped, but a non-empty array with no objects at all is
/// malformed.
pub fn parse_payload(text: &str) -> Result<Vec<RawMovie>> {
    let cleaned = strip_code_fence(text);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| CinemaError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("movies").or_else(|| map.remove("results")) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(CinemaError::MalformedResponse(
                    "expected an array of movies".to_string(),
                ))
            }
        },
        _ => {
            return Err(CinemaError::MalformedResponse(
                "expected an array of movies".to_string(),
            ))
        }
    };

    let total = items.len();
    let mut raws = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!("Dropping non-object entry at position {}", index);
            continue;
        }
        match serde_json::from_value::<RawMovie>(item) {
            Ok(raw) => raws.push(raw),
            Err(e) => warn!("Dropping unreadable entry at position {}: {}", index, e),
        }
    }

    if total > 0 && raws.is_empty() {
        return Err(CinemaError::MalformedResponse(format!(
            "none of the {} entries is an object",
            total
        )));
    }
    Ok(raws)
}

/// Parses and normalizes in one step.
pub fn normalize_response(text: &str, grounding_urls: &[String]) -> Result<Vec<Movie>> {
    let raws = parse_payload(text)?;
    Ok(normalize(raws, grounding_urls))
}

/// Turns raw records into movies, in input order. Records with no title at
/// all are dropped; missing or duplicate ids are repaired so ids stay unique
/// within the batch.
pub fn normalize(raws: Vec<RawMovie>, grounding_urls: &[String]) -> Vec<Movie> {
    let mut seen_ids = HashSet::new();
    let mut movies = Vec::with_capacity(raws.len());

    for raw in raws {
        let title = text_field(&raw.title);
        let original_title = text_field(&raw.original_title);
        let (title, original_title) = match (title, original_title) {
            (Some(t), Some(o)) => (t, o),
            (Some(t), None) => (t.clone(), t),
            (None, Some(o)) => (o.clone(), o),
            (None, None) => {
                warn!("Dropping record without a title");
                continue;
            }
        };

        let id = unique_id(text_field(&raw.id), &mut seen_ids);

        let mut candidates = string_list(&raw.sources);
        candidates.extend(grounding_urls.iter().cloned());
        let sources = filter_sources(&title, &original_title, candidates);

        movies.push(Movie {
            id,
            title,
            original_title,
            year: text_field(&raw.year).unwrap_or_default(),
            rating: number_field(&raw.rating).unwrap_or(0.0),
            poster: text_field(&raw.poster).unwrap_or_default(),
            media_type: parse_media_type(&raw.media_type),
            language_status: parse_language_status(&raw.language_status),
            genre: string_list(&raw.genre),
            description: text_field(&raw.description).unwrap_or_default(),
            quality: text_field(&raw.quality).unwrap_or_default(),
            duration: text_field(&raw.duration),
            sources,
        });
    }

    debug!("Normalized {} movies", movies.len());
    movies
}

/// Keeps plausible watch links for one title, trusted sites first. Falls
/// back to a single search link when nothing survives.
pub fn filter_sources(title: &str, original_title: &str, candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut kept: Vec<((u8, Reverse<TrustLevel>), String)> = Vec::new();

    for candidate in candidates {
        let candidate = candidate.trim().to_string();
        if candidate.is_empty() || !seen.insert(candidate.clone()) {
            continue;
        }

        let Some(url) = parse_absolute(&candidate) else {
            debug!("Rejecting non-URL candidate: {}", candidate);
            continue;
        };
        if is_blocked_domain(&url) || is_generic_page(&url) {
            debug!("Rejecting non-content link: {}", candidate);
            continue;
        }
        if !is_relevant(&url, title, original_title) {
            debug!("Rejecting unrelated link: {}", candidate);
            continue;
        }

        let rank = (sources::priority(&url), Reverse(sources::trust_level(&url)));
        kept.push((rank, candidate));
    }

    if kept.is_empty() {
        let query = if original_title.trim().is_empty() { title } else { original_title };
        return vec![fallback_url(query)];
    }

    // stable: equal priorities keep discovery order
    kept.sort_by_key(|(rank, _)| *rank);
    kept.into_iter().map(|(_, url)| url).collect()
}

pub fn fallback_url(title: &str) -> String {
    format!(
        "{}{}",
        FALLBACK_SEARCH_URL,
        urlencoding::encode(&format!("{} stream free", title.trim()))
    )
}

fn parse_absolute(candidate: &str) -> Option<Url> {
    let url = Url::parse(candidate).ok()?;
    let web = matches!(url.scheme(), "http" | "https");
    (web && url.host_str().is_some()).then_some(url)
}

fn host_of(url: &Url) -> String {
    url.host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_ascii_lowercase()
}

pub fn is_blocked_domain(url: &Url) -> bool {
    let host = host_of(url);
    if host.split('.').any(|label| label == "google") {
        return true;
    }
    BLOCKED_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
}

/// Home pages, search results and listing pages rather than a title page.
pub fn is_generic_page(url: &Url) -> bool {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return true;
    }
    let listing = path
        .split('/')
        .any(|segment| LISTING_SEGMENTS.contains(&segment.to_ascii_lowercase().as_str()));
    let search_query = url
        .query_pairs()
        .any(|(key, _)| SEARCH_QUERY_KEYS.iter().any(|k| *k == key));
    listing || search_query
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Share of the title's words that appear in the URL host or path.
pub fn relevance_score(url: &Url, title: &str) -> f64 {
    let title_tokens = tokens(title);
    if title_tokens.is_empty() {
        return 0.0;
    }
    let path = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());
    let url_tokens = tokens(&format!("{} {}", host_of(url), path));

    let hits = title_tokens.iter().filter(|t| url_tokens.contains(*t)).count();
    hits as f64 / title_tokens.len() as f64
}

fn is_relevant(url: &Url, title: &str, original_title: &str) -> bool {
    if tokens(title).is_empty() && tokens(original_title).is_empty() {
        return sources::lookup(url).is_some();
    }
    relevance_score(url, title).max(relevance_score(url, original_title)) >= MIN_RELEVANCE
}

fn unique_id(candidate: Option<String>, seen: &mut HashSet<String>) -> String {
    let base = candidate.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut id = base.clone();
    let mut n = 2;
    while !seen.insert(id.clone()) {
        id = format!("{}-{}", base, n);
        n += 1;
    }
    id
}

fn text_field(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(value: &Option<Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|r| r.is_finite()),
        _ => None,
    }
}

fn string_list(value: &Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| text_field(&Some(item.clone())))
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_media_type(value: &Option<Value>) -> MediaType {
    match text_field(value).map(|s| s.to_lowercase()).as_deref() {
        Some("series" | "show" | "tv" | "tv series" | "مسلسل" | "مسلسلات") => MediaType::Series,
        _ => MediaType::Movie,
    }
}

fn parse_language_status(value: &Option<Value>) -> LanguageStatus {
    match text_field(value).map(|s| s.to_lowercase()).as_deref() {
        Some("subtitled" | "مترجم") => LanguageStatus::Subtitled,
        Some("dubbed" | "مدبلج") => LanguageStatus::Dubbed,
        _ => LanguageStatus::Original,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // info string is optional and may share the line with the payload
        body = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}
