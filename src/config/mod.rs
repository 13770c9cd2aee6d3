use crate::error::{CinemaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_STORE_PATH: &str = "./cinema-flash-data";
const DEFAULT_HISTORY_LIMIT: usize = 500;
const DEFAULT_RESULT_COUNT: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Configuration {
    pub gemini: Option<GeminiConfig>,
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeminiConfig {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "resultCount")]
    pub result_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    #[serde(rename = "historyLimit")]
    pub history_limit: Option<usize>,
}

impl Configuration {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No configuration file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CinemaError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Configuration = serde_yaml::from_str(&content)
            .map_err(|e| CinemaError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Key from the config file, then `API_KEY`, then `GEMINI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.gemini
            .as_ref()
            .and_then(|g| g.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("API_KEY").ok().filter(|k| !k.trim().is_empty()))
            .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }

    pub fn model(&self) -> String {
        self.gemini
            .as_ref()
            .and_then(|g| g.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn base_url(&self) -> String {
        self.gemini
            .as_ref()
            .and_then(|g| g.base_url.clone())
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn result_count(&self) -> u32 {
        self.gemini
            .as_ref()
            .and_then(|g| g.result_count)
            .unwrap_or(DEFAULT_RESULT_COUNT)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    /// Maximum history entries kept; `None` means unbounded (`historyLimit: 0`).
    pub fn history_limit(&self) -> Option<usize> {
        let limit = self
            .store
            .as_ref()
            .and_then(|s| s.history_limit)
            .unwrap_or(DEFAULT_HISTORY_LIMIT);
        (limit > 0).then_some(limit)
    }
}
