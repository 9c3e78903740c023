//! Metadata fetcher - title lookups against an OMDb-style service

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::LibraryConfig;
use crate::error::ScanError;
use crate::models::Resolution;

/// Placeholder the service uses for missing values
const MISSING_VALUE: &str = "N/A";

/// Outcome of one title lookup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    /// `NotFound` when the service reported no match
    pub imdb_id: Resolution,
    /// Remaining fields, first letter lowercased, `N/A` mapped to null
    pub fields: Map<String, Value>,
}

impl Metadata {
    /// The service answered but had no match for the title
    pub fn not_found() -> Self {
        Self {
            imdb_id: Resolution::NotFound,
            fields: Map::new(),
        }
    }

    /// Whether the lookup produced an identifier
    pub fn is_resolved(&self) -> bool {
        self.imdb_id.is_resolved()
    }
}

/// Anything that can resolve a free-text title into metadata
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Look up `title`; a missing match is `Ok` with [`Resolution::NotFound`]
    async fn lookup(&self, title: &str) -> Result<Metadata, ScanError>;
}

/// HTTP client for the OMDb title endpoint
#[derive(Debug, Clone)]
pub struct OmdbClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl OmdbClient {
    /// Build a client with the configured endpoint, key and timeout
    pub fn new(config: &LibraryConfig) -> Result<Self, ScanError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl MetadataSource for OmdbClient {
    async fn lookup(&self, title: &str) -> Result<Metadata, ScanError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("apikey", self.api_key.as_str()), ("t", title)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::metadata(format!(
                "lookup for {:?} failed with HTTP {}: {}",
                title, status, body
            )));
        }

        let body: Value = response.json().await?;
        normalize_response(body)
    }
}

/// Reshape a raw service response into [`Metadata`]
pub fn normalize_response(body: Value) -> Result<Metadata, ScanError> {
    let mut raw = match body {
        Value::Object(map) => map,
        other => {
            return Err(ScanError::metadata(format!(
                "unexpected metadata response: {}",
                other
            )))
        }
    };

    if raw.get("Response").and_then(Value::as_str) != Some("True") {
        log::warn!("metadata lookup failed: {}", Value::Object(raw));
        return Ok(Metadata::not_found());
    }

    raw.remove("Response");
    if let Some(dvd) = raw.remove("DVD") {
        raw.insert("dvd".to_string(), dvd);
    }

    let mut fields: Map<String, Value> = raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) if s == MISSING_VALUE => Value::Null,
                other => other,
            };
            (lowercase_first(&key), value)
        })
        .collect();

    let imdb_id = match fields.remove("imdbID") {
        Some(Value::String(id)) if !id.is_empty() => Resolution::Resolved(id),
        _ => Resolution::Unresolved,
    };

    Ok(Metadata { imdb_id, fields })
}

fn lowercase_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
