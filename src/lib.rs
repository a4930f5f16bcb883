//! # Dataset Generator
//!
//! Builds image-classification datasets from a text query: images are found
//! through a public search API, normalized to RGB JPEG, resized to a fixed
//! square, split into train/val/test with a seeded shuffle and described by a
//! `dataset_info.json` plus a `README.md`.
//!
//! ## Modules
//!
//! - `source`: image search clients (`ImageSource`, Openverse)
//! - `download`: fetch and normalize raw images
//! - `processing`: size validation, resize/pad, JPEG encoding
//! - `dataset`: split assignment and directory layout
//! - `export`: metadata and README generation
//! - `pipeline`: the four-stage orchestrator
//! - `utils`: logging, errors, and helper functions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dataset_generator::{DatasetRequest, OpenverseClient, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let source = OpenverseClient::new(config.source.clone())?;
//! let pipeline = Pipeline::new(config, source)?;
//!
//! let result = pipeline.generate(&DatasetRequest::new("orange cats", 50, "Orange Cats"));
//! assert!(result.success);
//! ```

pub mod config;
pub mod dataset;
pub mod download;
pub mod export;
pub mod pipeline;
pub mod processing;
pub mod source;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{PipelineConfig, ProcessingConfig, ResizeMode, SplitConfig, SplitRatios};
pub use dataset::{DatasetOrganizer, OrganizeSummary, SplitName};
pub use download::{download_dataset, DownloadReport};
pub use export::{DatasetMetadata, MetadataExporter};
pub use pipeline::{DatasetRequest, FailureReason, Pipeline, PipelineResult, StageFailure};
pub use processing::{ImageProcessor, ProcessReport};
pub use source::{ImageReference, ImageSource, OpenverseClient};
pub use utils::error::{DatasetGenError, Result};

/// Default side length of processed images, in pixels
pub const DEFAULT_TARGET_SIZE: u32 = 256;

/// Images smaller than this in either dimension are rejected
pub const DEFAULT_MIN_SIZE: u32 = 100;

/// Default JPEG quality of processed images
pub const DEFAULT_QUALITY: u8 = 90;

/// JPEG quality used when normalizing raw downloads
pub const RAW_JPEG_QUALITY: u8 = 95;

/// Default shuffle seed
pub const DEFAULT_SEED: u64 = 42;

/// Default base directory for finished datasets
pub const DEFAULT_OUTPUT_DIR: &str = "data/processed";

/// Default root for per-run temporary directories
pub const DEFAULT_TEMP_DIR: &str = "data/temp";

/// Structured metadata file written into each dataset
pub const METADATA_FILE: &str = "dataset_info.json";

/// Narrative file written into each dataset
pub const README_FILE: &str = "README.md";

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
