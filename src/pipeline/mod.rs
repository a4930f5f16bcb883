//! End-to-end dataset generation
//!
//! Runs Download -> Process -> Organize -> Metadata in order. A stage that
//! yields nothing usable halts the run; the failure is recorded in the
//! returned [`PipelineResult`] together with the log of the stages that did
//! complete. Nothing is propagated to the caller as an error.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::dataset::{DatasetOrganizer, OrganizeSummary, SplitName};
use crate::download::{download_dataset, DownloadReport};
use crate::export::{GenerationInfo, MetadataExporter, ProcessingInfo};
use crate::processing::{ImageProcessor, ProcessReport};
use crate::source::ImageSource;
use crate::utils::error::{DatasetGenError, Result};
use crate::utils::logging::StageLogger;
use crate::utils::{check_dir_name, format_duration, sanitize_name};
use crate::{DEFAULT_OUTPUT_DIR, METADATA_FILE, README_FILE};

const STAGE_COUNT: usize = 4;

/// The four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Download,
    Process,
    Organize,
    Metadata,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Download => "download",
            PipelineStage::Process => "process",
            PipelineStage::Organize => "organize",
            PipelineStage::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// Why a stage halted the run
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("the image source returned no results")]
    SourceReturnedNothing,

    #[error("every download failed")]
    AllDownloadsFailed,

    #[error("every image was rejected during processing")]
    AllImagesRejected,

    #[error("no images were organized")]
    NothingOrganized,

    #[error("{0}")]
    Error(String),
}

/// The stage that stopped the run and why
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage} stage failed: {reason}")]
pub struct StageFailure {
    pub stage: PipelineStage,
    pub reason: FailureReason,
}

impl StageFailure {
    fn new(stage: PipelineStage, reason: FailureReason) -> Self {
        Self { stage, reason }
    }

    fn from_error(stage: PipelineStage, error: DatasetGenError) -> Self {
        Self::new(stage, FailureReason::Error(error.to_string()))
    }
}

/// What the metadata stage wrote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub total_images: usize,
    pub files: Vec<PathBuf>,
}

/// Records of the stages that completed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageLog {
    pub download: Option<DownloadReport>,
    pub process: Option<ProcessReport>,
    pub organize: Option<OrganizeSummary>,
    pub metadata: Option<MetadataRecord>,
}

/// Everything needed for one generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRequest {
    pub query: String,
    pub num_images: usize,
    pub dataset_name: String,
    pub description: String,
    pub output_base_dir: PathBuf,
    pub keep_temp_files: bool,
}

impl DatasetRequest {
    /// Request with no description, default output directory and temp cleanup
    pub fn new(query: impl Into<String>, num_images: usize, dataset_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_images,
            dataset_name: dataset_name.into(),
            description: String::new(),
            output_base_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            keep_temp_files: false,
        }
    }

    /// Category label derived from the query
    pub fn category(&self) -> String {
        sanitize_name(&self.query)
    }

    /// `<output_base_dir>/<sanitized dataset name>`
    pub fn dataset_dir(&self) -> PathBuf {
        self.output_base_dir.join(sanitize_name(&self.dataset_name))
    }

    /// Check the request before anything touches the filesystem
    ///
    /// The dataset directory is wiped before organizing, so its name must
    /// resolve to a child of `output_base_dir`.
    pub fn validate(&self) -> Result<()> {
        if self.num_images == 0 {
            return Err(DatasetGenError::InvalidInput(
                "number of images must be positive".to_string(),
            ));
        }
        check_dir_name(&sanitize_name(&self.dataset_name), "dataset name")?;
        check_dir_name(&self.category(), "category")
    }
}

/// Outcome of [`Pipeline::generate`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub query: String,
    pub dataset_name: String,
    pub category: String,
    pub stages: StageLog,
    /// Absolute dataset directory, set on success
    pub output_directory: Option<PathBuf>,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub error: Option<String>,
    pub failure: Option<StageFailure>,
    pub elapsed_secs: f64,
}

/// Sequences the stages for one image source
pub struct Pipeline<S: ImageSource> {
    config: PipelineConfig,
    source: S,
    processor: ImageProcessor,
    organizer: DatasetOrganizer,
    exporter: MetadataExporter,
}

impl<S: ImageSource> Pipeline<S> {
    /// Validate `config` once and build every stage
    pub fn new(config: PipelineConfig, source: S) -> Result<Self> {
        config.validate()?;

        let processor = ImageProcessor::new(config.processing.clone())?;
        let organizer = DatasetOrganizer::new(config.split.ratios, config.split.seed)?;

        Ok(Self {
            config,
            source,
            processor,
            organizer,
            exporter: MetadataExporter::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run all four stages for `request`
    pub fn generate(&self, request: &DatasetRequest) -> PipelineResult {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%f");
        let raw_dir = self.config.temp_dir.join(format!("{}_raw", timestamp));
        let processed_dir = self.config.temp_dir.join(format!("{}_processed", timestamp));
        let dataset_dir = request.dataset_dir();

        let mut result = PipelineResult {
            success: false,
            query: request.query.clone(),
            dataset_name: request.dataset_name.clone(),
            category: request.category(),
            stages: StageLog::default(),
            output_directory: None,
            raw_dir,
            processed_dir,
            error: None,
            failure: None,
            elapsed_secs: 0.0,
        };

        println!("\n{}", "=== Dataset Generation Pipeline ===".green().bold());
        println!("  Query:    {}", result.query);
        println!("  Images:   {}", request.num_images);
        println!("  Name:     {}", result.dataset_name);
        println!("  Category: {}", result.category);
        println!("  Output:   {:?}", dataset_dir);

        let mut logger = StageLogger::new(STAGE_COUNT);
        match self.run_stages(request, &dataset_dir, &mut result, &mut logger) {
            Ok(()) => {
                result.success = true;
                result.output_directory =
                    Some(fs::canonicalize(&dataset_dir).unwrap_or(dataset_dir));

                if !request.keep_temp_files {
                    remove_temp_dir(&result.raw_dir);
                    remove_temp_dir(&result.processed_dir);
                }
            }
            Err(failure) => {
                logger.log_halt(&failure.to_string());
                result.error = Some(failure.to_string());
                result.failure = Some(failure);
            }
        }

        result.elapsed_secs = logger.elapsed_secs();
        print_outcome(&result);
        result
    }

    fn run_stages(
        &self,
        request: &DatasetRequest,
        dataset_dir: &Path,
        result: &mut PipelineResult,
        logger: &mut StageLogger,
    ) -> std::result::Result<(), StageFailure> {
        use PipelineStage::*;

        request
            .validate()
            .map_err(|e| StageFailure::from_error(Download, e))?;

        // Download
        stage_banner(1, "Downloading images");
        logger.start_stage("download");
        clear_dir(&result.raw_dir).map_err(|e| StageFailure::from_error(Download, e))?;
        let delay = Duration::from_millis(self.config.source.download_delay_ms);
        let download = download_dataset(
            &self.source,
            &request.query,
            request.num_images,
            &result.raw_dir,
            delay,
        )
        .map_err(|e| StageFailure::from_error(Download, e))?;

        let downloaded = download.downloaded.len();
        let found = download.found;
        logger.end_stage(&format!("{} of {} downloaded", downloaded, found));
        result.stages.download = Some(download);
        if found == 0 {
            return Err(StageFailure::new(Download, FailureReason::SourceReturnedNothing));
        }
        if downloaded == 0 {
            return Err(StageFailure::new(Download, FailureReason::AllDownloadsFailed));
        }

        // Process
        stage_banner(2, "Processing images");
        logger.start_stage("process");
        let process = self
            .processor
            .process_batch(&result.raw_dir, &result.processed_dir, true)
            .map_err(|e| StageFailure::from_error(Process, e))?;

        let processed = process.processed.len();
        logger.end_stage(&format!("{} of {} processed", processed, process.total));
        result.stages.process = Some(process);
        if processed == 0 {
            return Err(StageFailure::new(Process, FailureReason::AllImagesRejected));
        }

        // Organize
        stage_banner(3, "Organizing dataset");
        logger.start_stage("organize");
        let summary = self
            .organizer
            .organize(&result.processed_dir, dataset_dir, &result.category, true, false)
            .map_err(|e| match e {
                DatasetGenError::NoImages(_) => {
                    StageFailure::new(Organize, FailureReason::NothingOrganized)
                }
                other => StageFailure::from_error(Organize, other),
            })?;

        let organized = summary.organized();
        logger.end_stage(&format!(
            "train={} val={} test={}",
            summary.count(SplitName::Train),
            summary.count(SplitName::Val),
            summary.count(SplitName::Test)
        ));
        result.stages.organize = Some(summary);
        if organized == 0 {
            return Err(StageFailure::new(Organize, FailureReason::NothingOrganized));
        }

        // Metadata
        stage_banner(4, "Generating metadata");
        logger.start_stage("metadata");
        let generation_info = GenerationInfo {
            query: request.query.clone(),
            processing: ProcessingInfo::from(&self.config.processing),
            split_ratios: self.config.split.ratios,
            random_seed: self.config.split.seed,
        };
        let metadata = self
            .exporter
            .export(
                dataset_dir,
                &request.dataset_name,
                &request.description,
                self.source.name(),
                Some(generation_info),
            )
            .map_err(|e| StageFailure::from_error(Metadata, e))?;

        logger.end_stage(&format!("{} images described", metadata.statistics.total_images));
        result.stages.metadata = Some(MetadataRecord {
            total_images: metadata.statistics.total_images,
            files: vec![dataset_dir.join(METADATA_FILE), dataset_dir.join(README_FILE)],
        });

        Ok(())
    }
}

fn stage_banner(index: usize, title: &str) {
    println!(
        "\n{}",
        format!("--- Stage {}/{}: {} ---", index, STAGE_COUNT, title).cyan().bold()
    );
}

/// Drop leftovers from an earlier run that used the same directory
fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        warn!("Removing stale files in {:?}", dir);
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

fn remove_temp_dir(dir: &Path) {
    if !dir.exists() {
        return;
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => info!("Removed {:?}", dir),
        Err(e) => warn!("Could not remove {:?}: {}", dir, e),
    }
}

fn print_outcome(result: &PipelineResult) {
    println!();
    if !result.success {
        println!("{}", "Pipeline failed".red().bold());
        if let Some(error) = &result.error {
            println!("  {}", error);
        }
        return;
    }

    println!("{}", "Pipeline completed successfully".green().bold());
    if let Some(dir) = &result.output_directory {
        println!("  Dataset:  {}", dir.display());
    }
    if let Some(summary) = &result.stages.organize {
        println!("  Images:   {}", summary.organized());
        for split in SplitName::ALL {
            println!("    {:<5} {}", split.as_str(), summary.count(split));
        }
    }
    println!("  Files:    {}, {}", METADATA_FILE, README_FILE);
    println!("  Time:     {}", format_duration(result.elapsed_secs));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitRatios;
    use crate::source::ImageReference;
    use tempfile::TempDir;

    struct EmptySource;

    impl ImageSource for EmptySource {
        fn name(&self) -> &str {
            "empty"
        }
        fn search(&self, _query: &str, _count: usize) -> Vec<ImageReference> {
            Vec::new()
        }
        fn fetch(&self, _reference: &ImageReference) -> Result<Vec<u8>> {
            Err(DatasetGenError::InvalidInput("unreachable".into()))
        }
    }

    /// Lists references whose fetch always fails
    struct BrokenSource;

    impl ImageSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }
        fn search(&self, _query: &str, count: usize) -> Vec<ImageReference> {
            (0..count)
                .map(|i| ImageReference::from_url(format!("https://x/{i}.jpg")))
                .collect()
        }
        fn fetch(&self, reference: &ImageReference) -> Result<Vec<u8>> {
            Err(DatasetGenError::Download {
                url: reference.url.clone().unwrap_or_default(),
                reason: "connection refused".into(),
            })
        }
    }

    fn config_in(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.temp_dir = dir.join("temp");
        config.source.download_delay_ms = 0;
        config
    }

    fn request_in(dir: &Path) -> DatasetRequest {
        DatasetRequest {
            output_base_dir: dir.join("out"),
            ..DatasetRequest::new("Orange Cats", 5, "My Cats")
        }
    }

    #[test]
    fn test_request_paths() {
        let request = DatasetRequest::new("Orange Cats", 5, "My Cat Set");
        assert_eq!(request.category(), "orange_cats");
        assert_eq!(
            request.dataset_dir(),
            PathBuf::from(DEFAULT_OUTPUT_DIR).join("my_cat_set")
        );
    }

    #[test]
    fn test_request_validation() {
        assert!(DatasetRequest::new("Orange Cats", 5, "My Cats").validate().is_ok());
        assert!(DatasetRequest::new("Orange Cats", 0, "My Cats").validate().is_err());
        assert!(DatasetRequest::new("Orange Cats", 5, "   ").validate().is_err());
        assert!(DatasetRequest::new("Orange Cats", 5, "..").validate().is_err());
        assert!(DatasetRequest::new("cats/dogs", 5, "My Cats").validate().is_err());
        assert!(DatasetRequest::new("", 5, "My Cats").validate().is_err());
    }

    #[test]
    fn test_invalid_ratios_rejected_at_construction() {
        let mut config = PipelineConfig::default();
        config.split.ratios = SplitRatios {
            train: 0.5,
            val: 0.3,
            test: 0.3,
        };
        assert!(Pipeline::new(config, EmptySource).is_err());
    }

    #[test]
    fn test_empty_source_halts_at_download() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()), EmptySource).unwrap();

        let result = pipeline.generate(&request_in(dir.path()));

        assert!(!result.success);
        assert_eq!(
            result.failure,
            Some(StageFailure::new(
                PipelineStage::Download,
                FailureReason::SourceReturnedNothing
            ))
        );
        assert!(result.stages.download.is_some());
        assert!(result.stages.process.is_none());
        assert!(!dir.path().join("out/my_cats").exists());
    }

    #[test]
    fn test_all_downloads_failing_is_distinguished() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config_in(dir.path()), BrokenSource).unwrap();

        let result = pipeline.generate(&request_in(dir.path()));

        let failure = result.failure.unwrap();
        assert_eq!(failure.reason, FailureReason::AllDownloadsFailed);
        assert_eq!(result.stages.download.unwrap().failed, 5);
        // temp dirs stay in place after a failure
        assert!(result.raw_dir.is_dir());
    }

    #[test]
    fn test_failure_message() {
        let failure = StageFailure::new(PipelineStage::Process, FailureReason::AllImagesRejected);
        assert_eq!(
            failure.to_string(),
            "process stage failed: every image was rejected during processing"
        );
    }
}
