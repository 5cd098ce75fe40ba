use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

use crate::error::SyncError;

const DEFAULT_MAX_PAGES: usize = 10;

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

/// Where to reach the relay and which remote collection to mirror.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub collection_id: String,
    /// Upper bound on result pages fetched by one full sync.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl SyncConfig {
    pub fn new(endpoint: &str, collection_id: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            collection_id: collection_id.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(SyncError::Configuration(
                "relay endpoint is not set".to_string(),
            ));
        }
        if self.collection_id.trim().is_empty() {
            return Err(SyncError::Configuration(
                "database ID is not set".to_string(),
            ));
        }
        Url::parse(endpoint)
            .map_err(|e| SyncError::Configuration(format!("invalid relay endpoint: {}", e)))?;
        Ok(())
    }

    pub fn collection_id(&self) -> String {
        normalize_collection_id(&self.collection_id)
    }
}

fn trailing_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([0-9a-f]{32})$").expect("collection id pattern is valid")
    })
}

/// Accepts a bare identifier or a shared link to the collection. Links yield
/// the 32-hex-digit identifier that ends their last path segment; anything
/// else comes back trimmed.
pub fn normalize_collection_id(input: &str) -> String {
    let input = input.trim();
    let Ok(url) = Url::parse(input) else {
        return input.to_string();
    };
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or_default()
        .replace('-', "");
    trailing_id_pattern()
        .captures(&segment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| input.to_string())
}
