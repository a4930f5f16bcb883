//! Image processing stage
//!
//! Validates raw downloads against a minimum size, brings them to a fixed
//! square and re-encodes them as JPEG. Items that fail for any reason are
//! logged and skipped; the batch always runs to the end.

pub mod transform;

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProcessingConfig;
use crate::utils::error::{DatasetGenError, Result, ResultExt};
use crate::utils::{has_extension, percentage, round2};

pub use transform::{convert_to_rgb, fit_within, resize_to_square, save_jpeg};

/// Extensions picked up from the raw directory
pub const PROCESSABLE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "gif"];

/// Outcome of one batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessReport {
    /// Image files found in the input directory
    pub total: usize,
    /// Written output files, in processing order
    pub processed: Vec<PathBuf>,
    /// Files rejected or failed
    pub rejected: usize,
}

impl ProcessReport {
    /// Share of inputs that made it through, in percent
    pub fn success_rate(&self) -> f64 {
        percentage(self.processed.len(), self.total)
    }
}

/// Quick health summary of a directory of images
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageDirStats {
    pub total_images: usize,
    pub valid_images: usize,
    pub invalid_images: usize,
    pub average_size_mb: f64,
    /// Dimensions of up to five valid images
    pub sample_dimensions: Vec<(u32, u32)>,
}

/// Validates, resizes and re-encodes images
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: ProcessingConfig,
}

impl ImageProcessor {
    /// Create a processor, rejecting out-of-range quality or a zero target size
    pub fn new(config: ProcessingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Processing settings in use
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Check that an image decodes and meets the minimum size.
    ///
    /// Returns the decoded image so callers do not read it twice.
    pub fn validate_image(&self, path: &Path) -> Result<image::DynamicImage> {
        let reader = ImageReader::open(path)?
            .with_guessed_format()
            .map_err(|e| DatasetGenError::Image(path.to_path_buf(), e.to_string()))?;

        let image = reader
            .decode()
            .map_err(|e| DatasetGenError::Image(path.to_path_buf(), format!("invalid image: {e}")))?;

        let (width, height) = (image.width(), image.height());
        let min = self.config.min_size;
        if width < min || height < min {
            return Err(DatasetGenError::Image(
                path.to_path_buf(),
                format!("too small ({}x{}, minimum {}x{})", width, height, min, min),
            ));
        }

        Ok(image)
    }

    /// Validate, convert, resize and save one image as JPEG
    pub fn process_single_image(&self, input: &Path, output: &Path) -> Result<()> {
        let image = self.validate_image(input)?;

        let rgb = convert_to_rgb(&image);
        let resized = resize_to_square(&rgb, self.config.target_size, self.config.resize_mode);

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        save_jpeg(&resized, output, self.config.quality)
    }

    /// Process every image in `input_dir` into `output_dir`
    ///
    /// Outputs keep the input stem with a `.jpg` extension.
    pub fn process_batch(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        clean_output: bool,
    ) -> Result<ProcessReport> {
        if clean_output && output_dir.exists() {
            fs::remove_dir_all(output_dir)?;
        }
        fs::create_dir_all(output_dir)?;

        let files = list_images(input_dir, &PROCESSABLE_EXTENSIONS)?;
        let mut report = ProcessReport {
            total: files.len(),
            ..ProcessReport::default()
        };

        if files.is_empty() {
            warn!("No images found in {:?}", input_dir);
            return Ok(report);
        }

        info!(
            "Processing {} images (target {}x{}, mode {:?}, quality {})",
            files.len(),
            self.config.target_size,
            self.config.target_size,
            self.config.resize_mode,
            self.config.quality
        );

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        for input in &files {
            let outcome = input
                .file_stem()
                .and_then(|s| s.to_str())
                .with_context(|| format!("Unusable file name: {:?}", input))
                .and_then(|stem| {
                    let output = output_dir.join(format!("{}.jpg", stem));
                    self.process_single_image(input, &output).map(|_| output)
                });

            match outcome {
                Ok(output) => {
                    debug!("Processed {:?} -> {:?}", input, output);
                    report.processed.push(output);
                }
                Err(e) => {
                    warn!("Skipping {:?}: {}", input, e);
                    report.rejected += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            "Processing complete: {}/{} images ({:.1}%)",
            report.processed.len(),
            report.total,
            report.success_rate()
        );

        Ok(report)
    }

    /// Count valid and invalid images in a directory
    pub fn image_stats(&self, dir: &Path) -> Result<ImageDirStats> {
        let files = list_images(dir, &PROCESSABLE_EXTENSIONS)?;
        let mut stats = ImageDirStats {
            total_images: files.len(),
            ..ImageDirStats::default()
        };

        let mut total_bytes: u64 = 0;
        for path in &files {
            let decoded = ImageReader::open(path)
                .and_then(|r| r.with_guessed_format())
                .map_err(image::ImageError::IoError)
                .and_then(|r| r.decode());

            match decoded {
                Ok(image) => {
                    stats.valid_images += 1;
                    total_bytes += fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                    if stats.sample_dimensions.len() < 5 {
                        stats.sample_dimensions.push((image.width(), image.height()));
                    }
                }
                Err(_) => stats.invalid_images += 1,
            }
        }

        if stats.valid_images > 0 {
            stats.average_size_mb =
                round2(total_bytes as f64 / stats.valid_images as f64 / 1024.0 / 1024.0);
        }

        Ok(stats)
    }
}

/// Regular files in `dir` with a matching extension, sorted by file name
pub fn list_images(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DatasetGenError::PathNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}
