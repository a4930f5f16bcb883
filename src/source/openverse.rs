//! Openverse image search client
//!
//! Pages through `GET /v1/images/?q=..&page_size=..&page=..` with a blocking
//! reqwest client. Listing errors end pagination early and never surface to
//! the caller; fetch errors are returned per item.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ImageReference, ImageSource};
use crate::config::SourceConfig;
use crate::utils::error::{DatasetGenError, Result};

/// One page of search results
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchPage {
    result_count: Option<u64>,
    page_count: Option<u32>,
    results: Vec<ImageReference>,
}

/// Blocking client for the Openverse image API
pub struct OpenverseClient {
    client: Client,
    config: SourceConfig,
}

impl OpenverseClient {
    /// Create a client with the configured timeout and identifying header
    pub fn new(config: SourceConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    /// Client with default settings
    pub fn with_defaults() -> Result<Self> {
        Self::new(SourceConfig::default())
    }

    /// Request a single page of results
    fn fetch_page(&self, query: &str, page: u32, page_size: usize) -> Result<SearchPage> {
        let params = [
            ("q", query.to_string()),
            ("page_size", page_size.to_string()),
            ("page", page.to_string()),
        ];

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .send()?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DatasetGenError::Http(format!(
                "search endpoint requires authentication (401) for page {}",
                page
            )));
        }
        if !status.is_success() {
            return Err(DatasetGenError::Http(format!(
                "search endpoint returned {} for page {}",
                status, page
            )));
        }

        Ok(response.json::<SearchPage>()?)
    }
}

impl ImageSource for OpenverseClient {
    fn name(&self) -> &str {
        "openverse"
    }

    fn search(&self, query: &str, count: usize) -> Vec<ImageReference> {
        if count == 0 {
            return Vec::new();
        }

        // Page size stays fixed so page numbers map to stable offsets
        let page_size = count.min(self.config.max_page_size);
        let mut results: Vec<ImageReference> = Vec::new();
        let mut page: u32 = 1;

        while results.len() < count {
            if page > 1 && self.config.page_delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.config.page_delay_ms));
            }

            let body = match self.fetch_page(query, page, page_size) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Search for '{}' stopped at page {}: {}", query, page, e);
                    break;
                }
            };

            let received = body.results.len();
            debug!(
                "Page {} returned {} results (reported total: {:?})",
                page, received, body.result_count
            );
            results.extend(body.results);

            if received < page_size {
                break;
            }
            if let Some(page_count) = body.page_count {
                if page >= page_count {
                    break;
                }
            }

            page += 1;
        }

        results.truncate(count);
        info!("Found {} images for '{}'", results.len(), query);
        results
    }

    fn fetch(&self, reference: &ImageReference) -> Result<Vec<u8>> {
        let url = reference
            .url
            .as_deref()
            .ok_or_else(|| DatasetGenError::InvalidInput("image reference has no URL".into()))?;

        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| DatasetGenError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let bytes = response.bytes().map_err(|e| DatasetGenError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}
