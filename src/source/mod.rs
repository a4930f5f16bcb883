//! Image sources
//!
//! A source answers two questions: which images match a query, and what are
//! the bytes behind one of those matches. The pipeline only talks to the
//! [`ImageSource`] trait; [`openverse::OpenverseClient`] is the remote
//! implementation used by the CLI.

pub mod openverse;

use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

pub use openverse::OpenverseClient;

/// One discoverable image, as described by a search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageReference {
    /// Identifier assigned by the source
    pub id: Option<String>,
    /// Direct URL of the image bytes
    pub url: Option<String>,
    /// Title given by the creator
    pub title: Option<String>,
    /// Creator name
    pub creator: Option<String>,
    /// License short name (e.g. "by-sa")
    pub license: Option<String>,
    /// Upstream provider (e.g. "flickr")
    pub provider: Option<String>,
    /// Reported width, if known
    pub width: Option<u32>,
    /// Reported height, if known
    pub height: Option<u32>,
}

impl ImageReference {
    /// Reference pointing at `url` with nothing else known
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Something that can list and fetch images for a text query
pub trait ImageSource {
    /// Short tag recorded in the metadata document (e.g. "openverse")
    fn name(&self) -> &str;

    /// Return up to `count` references matching `query`.
    ///
    /// Never fails: errors end the listing early and whatever was gathered is
    /// returned. An empty vector means nothing was found.
    fn search(&self, query: &str, count: usize) -> Vec<ImageReference>;

    /// Fetch the raw bytes behind one reference
    fn fetch(&self, reference: &ImageReference) -> Result<Vec<u8>>;
}
