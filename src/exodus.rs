// 🌐 Exodus client - the external reference dataset of trackers
//
// GET {hostname}/api/trackers returns {"trackers": {<id>: {...}, ...}}.
// Records keep the order they have in the document.

use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, info};

pub const DEFAULT_HOSTNAME: &str = "https://reports.exodus-privacy.eu.org";
pub const API_PATH: &str = "/api/trackers";

// ============================================================================
// EXTERNAL RECORDS
// ============================================================================

/// One tracker as published by Exodus; fields are kept as raw JSON
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTracker {
    /// Key of the record in the `trackers` object
    pub key: String,
    pub fields: Map<String, Value>,
}

impl ExternalTracker {
    pub fn new(key: &str, fields: Map<String, Value>) -> Self {
        ExternalTracker {
            key: key.to_string(),
            fields,
        }
    }

    /// String value of a field; None when absent, null or not a string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn name(&self) -> &str {
        self.get_str("name").unwrap_or_default()
    }

    /// Field rendered for display; absent values show as `<missing>`
    pub fn display_value(&self, field: &str) -> String {
        match self.fields.get(field) {
            None | Some(Value::Null) => "<missing>".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalDataset {
    pub trackers: Vec<ExternalTracker>,
}

impl ExternalDataset {
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Parse a `{"trackers": {...}}` document
    pub fn from_value(document: Value) -> Result<Self> {
        let trackers = match document {
            Value::Object(mut root) => match root.remove("trackers") {
                Some(Value::Object(trackers)) => trackers,
                _ => return Err(CatalogError::ExternalSourceEmpty),
            },
            _ => return Err(CatalogError::ExternalSourceEmpty),
        };

        let trackers = trackers
            .into_iter()
            .filter_map(|(key, record)| match record {
                Value::Object(fields) => Some(ExternalTracker::new(&key, fields)),
                _ => None,
            })
            .collect();

        Ok(ExternalDataset { trackers })
    }

    pub fn from_json_str(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Err(CatalogError::ExternalSourceEmpty);
        }
        Self::from_value(serde_json::from_str(body)?)
    }
}

// ============================================================================
// SOURCE SEAM
// ============================================================================

#[async_trait]
pub trait TrackerSource: Send + Sync {
    async fn fetch_trackers(&self) -> Result<ExternalDataset>;
}

/// HTTP client for an Exodus instance
pub struct ExodusClient {
    client: Client,
    url: String,
}

impl ExodusClient {
    /// Client for `{hostname}/api/trackers`
    pub fn new(hostname: &str) -> Self {
        Self::for_url(&format!("{}{}", hostname.trim_end_matches('/'), API_PATH))
    }

    /// Client for a full document URL
    pub fn for_url(url: &str) -> Self {
        ExodusClient {
            client: Client::new(),
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for ExodusClient {
    fn default() -> Self {
        Self::new(DEFAULT_HOSTNAME)
    }
}

#[async_trait]
impl TrackerSource for ExodusClient {
    async fn fetch_trackers(&self) -> Result<ExternalDataset> {
        debug!(url = %self.url, "fetching trackers");

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(CatalogError::ExternalSourceUnavailable(status.as_u16()));
        }

        let body = response.text().await?;
        let dataset = ExternalDataset::from_json_str(&body)?;
        info!(count = dataset.len(), "retrieved trackers from Exodus");

        Ok(dataset)
    }
}
