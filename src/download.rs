//! Download stage
//!
//! Fetches every reference a source returns, normalizes it to an opaque RGB
//! JPEG and stores it as `image_0001.jpg`, `image_0002.jpg`, ... Failures are
//! counted per item and never abort the batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::processing::{convert_to_rgb, save_jpeg};
use crate::source::{ImageReference, ImageSource};
use crate::utils::error::{DatasetGenError, Result};
use crate::RAW_JPEG_QUALITY;

/// Outcome of a download run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Images asked for
    pub requested: usize,
    /// References the source returned
    pub found: usize,
    /// Files written, in reference order
    pub downloaded: Vec<PathBuf>,
    /// References that could not be fetched or decoded
    pub failed: usize,
}

/// File name for the `index`-th (1-based) download
pub fn raw_file_name(index: usize) -> String {
    format!("image_{:04}.jpg", index)
}

/// Fetch one reference and write it as an RGB JPEG
pub fn download_image<S: ImageSource + ?Sized>(
    source: &S,
    reference: &ImageReference,
    save_dir: &Path,
    index: usize,
) -> Result<PathBuf> {
    let bytes = source.fetch(reference)?;

    let image = image::load_from_memory(&bytes).map_err(|e| DatasetGenError::Download {
        url: reference.url.clone().unwrap_or_default(),
        reason: format!("not a decodable image: {e}"),
    })?;

    let rgb = convert_to_rgb(&image);
    let path = save_dir.join(raw_file_name(index));
    save_jpeg(&rgb, &path, RAW_JPEG_QUALITY)?;

    Ok(path)
}

/// Search `source` for `query` and download up to `count` images into `save_dir`
pub fn download_dataset<S: ImageSource + ?Sized>(
    source: &S,
    query: &str,
    count: usize,
    save_dir: &Path,
    delay: Duration,
) -> Result<DownloadReport> {
    fs::create_dir_all(save_dir)?;

    info!("Searching '{}' in {}...", query, source.name());
    let references = source.search(query, count);

    let mut report = DownloadReport {
        requested: count,
        found: references.len(),
        ..DownloadReport::default()
    };

    if references.is_empty() {
        warn!("No images found for '{}'", query);
        return Ok(report);
    }

    info!("Downloading {} images...", references.len());
    let pb = ProgressBar::new(references.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  [{elapsed_precise}] {bar:40.green/white} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    for (i, reference) in references.iter().enumerate() {
        let index = i + 1;
        match download_image(source, reference, save_dir, index) {
            Ok(path) => {
                debug!("Saved {:?}", path);
                report.downloaded.push(path);
            }
            Err(e) => {
                warn!("Image {} failed: {}", index, e);
                report.failed += 1;
            }
        }
        pb.inc(1);

        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    pb.finish_and_clear();
    info!(
        "Downloaded {}/{} images into {:?}",
        report.downloaded.len(),
        report.found,
        save_dir
    );

    Ok(report)
}
