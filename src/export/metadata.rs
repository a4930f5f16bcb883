//! Dataset statistics gathered from an organized tree

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{ProcessingConfig, ResizeMode, SplitRatios};
use crate::dataset::organizer::subdirectories;
use crate::dataset::{SplitName, DATASET_EXTENSIONS};
use crate::utils::error::{DatasetGenError, Result};
use crate::utils::{has_extension, round2};

const BYTES_PER_KB: f64 = 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Attributes read from one image file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub filename: String,
    /// Container format, e.g. "JPEG"
    pub format: String,
    /// Channel layout, e.g. "RGB" or "L"
    pub mode: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub size_kb: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Aggregates over the images of one category within one split
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatistics {
    pub count: usize,
    pub total_size_mb: f64,
    pub average_size_kb: f64,
    /// Format name -> image count
    pub formats: BTreeMap<String, usize>,
    pub average_dimensions: AverageDimensions,
}

impl CategoryStatistics {
    /// Aggregate a list of image records
    pub fn from_images(images: &[ImageInfo]) -> Self {
        if images.is_empty() {
            return Self::default();
        }

        let count = images.len();
        let total_bytes: u64 = images.iter().map(|i| i.size_bytes).sum();
        let total_width: u64 = images.iter().map(|i| i.width as u64).sum();
        let total_height: u64 = images.iter().map(|i| i.height as u64).sum();

        let mut formats = BTreeMap::new();
        for image in images {
            *formats.entry(image.format.clone()).or_insert(0) += 1;
        }

        Self {
            count,
            total_size_mb: round2(total_bytes as f64 / BYTES_PER_MB),
            average_size_kb: round2(total_bytes as f64 / count as f64 / BYTES_PER_KB),
            formats,
            average_dimensions: AverageDimensions {
                width: (total_width as f64 / count as f64).round() as u32,
                height: (total_height as f64 / count as f64).round() as u32,
            },
        }
    }
}

/// One line of the per-category image list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub filename: String,
    /// `WxH`
    pub dimensions: String,
    pub size_kb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetadata {
    /// Relative to the dataset root
    pub path: String,
    pub statistics: CategoryStatistics,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitMetadata {
    /// Relative to the dataset root
    pub path: String,
    pub categories: BTreeMap<String, CategoryMetadata>,
    pub total_images: usize,
}

/// Split records in train, val, test order; splits missing on disk are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Splits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train: Option<SplitMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<SplitMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<SplitMetadata>,
}

impl Splits {
    pub fn get(&self, split: SplitName) -> Option<&SplitMetadata> {
        match split {
            SplitName::Train => self.train.as_ref(),
            SplitName::Val => self.val.as_ref(),
            SplitName::Test => self.test.as_ref(),
        }
    }

    fn set(&mut self, split: SplitName, metadata: SplitMetadata) {
        match split {
            SplitName::Train => self.train = Some(metadata),
            SplitName::Val => self.val = Some(metadata),
            SplitName::Test => self.test = Some(metadata),
        }
    }

    /// Present splits, in layout order
    pub fn iter(&self) -> impl Iterator<Item = (SplitName, &SplitMetadata)> {
        SplitName::ALL
            .into_iter()
            .filter_map(move |s| self.get(s).map(|m| (s, m)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    pub total_images: usize,
    pub total_size_mb: f64,
    /// Sorted, deduplicated
    pub categories: Vec<String>,
}

/// Processing settings as recorded in the metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    /// `WxH`
    pub target_size: String,
    /// `WxH`
    pub min_size: String,
    pub quality: u8,
    pub maintain_aspect_ratio: bool,
}

impl From<&ProcessingConfig> for ProcessingInfo {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            target_size: format!("{0}x{0}", config.target_size),
            min_size: format!("{0}x{0}", config.min_size),
            quality: config.quality,
            maintain_aspect_ratio: config.resize_mode == ResizeMode::Pad,
        }
    }
}

/// How a generated dataset was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub query: String,
    pub processing: ProcessingInfo,
    pub split_ratios: SplitRatios,
    pub random_seed: u64,
}

/// Content of `dataset_info.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_name: String,
    pub description: String,
    pub source: String,
    pub created_at: String,
    pub root_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_info: Option<GenerationInfo>,
    pub splits: Splits,
    pub statistics: GlobalStatistics,
}

/// Read format, color mode, dimensions and size of one image without decoding pixels
pub fn image_info(path: &Path) -> Result<ImageInfo> {
    let image_err = |e: image::ImageError| DatasetGenError::Image(path.to_path_buf(), e.to_string());

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    let decoder = reader.into_decoder().map_err(image_err)?;
    let (width, height) = decoder.dimensions();
    let mode = color_mode(decoder.color_type());

    let size_bytes = fs::metadata(path)?.len();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ImageInfo {
        filename,
        format: format.map(format_name).unwrap_or_else(|| "UNKNOWN".to_string()),
        mode: mode.to_string(),
        width,
        height,
        size_bytes,
        size_kb: round2(size_bytes as f64 / BYTES_PER_KB),
    })
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "UNKNOWN",
    }
}

/// Info for every readable image directly inside `dir`, by file name
pub fn scan_directory(dir: &Path) -> Vec<ImageInfo> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), &DATASET_EXTENSIONS))
        .filter_map(|e| match image_info(e.path()) {
            Ok(info) => Some(info),
            Err(err) => {
                warn!("Cannot read {:?}: {}", e.path(), err);
                None
            }
        })
        .collect()
}

/// Builds and writes dataset metadata
#[derive(Debug, Clone, Default)]
pub struct MetadataExporter;

impl MetadataExporter {
    pub fn new() -> Self {
        Self
    }

    /// Scan `root` and build its metadata record
    pub fn generate(
        &self,
        root: &Path,
        dataset_name: &str,
        description: &str,
        source: &str,
        generation_info: Option<GenerationInfo>,
    ) -> Result<DatasetMetadata> {
        if !root.is_dir() {
            return Err(DatasetGenError::PathNotFound(root.to_path_buf()));
        }
        info!("Scanning dataset at {:?}", root);

        let mut splits = Splits::default();
        let mut categories = BTreeSet::new();
        let mut total_images = 0;
        let mut total_bytes: u64 = 0;

        for split in SplitName::ALL {
            let split_dir = root.join(split.as_str());
            if !split_dir.is_dir() {
                warn!("{}/ not found, skipping", split);
                continue;
            }

            let mut split_meta = SplitMetadata {
                path: split.as_str().to_string(),
                ..SplitMetadata::default()
            };

            for category_dir in subdirectories(&split_dir)? {
                let name = category_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let images = scan_directory(&category_dir);
                let statistics = CategoryStatistics::from_images(&images);

                split_meta.total_images += statistics.count;
                total_bytes += images.iter().map(|i| i.size_bytes).sum::<u64>();
                categories.insert(name.clone());

                let entries = images
                    .iter()
                    .map(|i| ImageEntry {
                        filename: i.filename.clone(),
                        dimensions: format!("{}x{}", i.width, i.height),
                        size_kb: i.size_kb,
                    })
                    .collect();

                split_meta.categories.insert(
                    name.clone(),
                    CategoryMetadata {
                        path: format!("{}/{}", split.as_str(), name),
                        statistics,
                        images: entries,
                    },
                );
            }

            debug!(
                "{}: {} images in {} categories",
                split,
                split_meta.total_images,
                split_meta.categories.len()
            );
            total_images += split_meta.total_images;
            splits.set(split, split_meta);
        }

        let metadata = DatasetMetadata {
            dataset_name: dataset_name.to_string(),
            description: description.to_string(),
            source: source.to_string(),
            created_at: Local::now().to_rfc3339(),
            root_path: fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
            generation_info,
            splits,
            statistics: GlobalStatistics {
                total_images,
                total_size_mb: round2(total_bytes as f64 / BYTES_PER_MB),
                categories: categories.into_iter().collect(),
            },
        };

        info!(
            "Metadata: {} images, {} MB, categories: {}",
            metadata.statistics.total_images,
            metadata.statistics.total_size_mb,
            metadata.statistics.categories.join(", ")
        );

        Ok(metadata)
    }

    /// Write `metadata` as pretty-printed JSON
    pub fn save_json(&self, metadata: &DatasetMetadata, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(metadata)?;
        fs::write(path, json)?;
        info!("Metadata saved to {:?}", path);
        Ok(())
    }

    /// Generate metadata for `root` and write `dataset_info.json` and `README.md` into it
    pub fn export(
        &self,
        root: &Path,
        dataset_name: &str,
        description: &str,
        source: &str,
        generation_info: Option<GenerationInfo>,
    ) -> Result<DatasetMetadata> {
        let metadata = self.generate(root, dataset_name, description, source, generation_info)?;

        self.save_json(&metadata, &root.join(crate::METADATA_FILE))?;

        let readme_path = root.join(crate::README_FILE);
        fs::write(&readme_path, super::readme::render(&metadata))?;
        info!("README saved to {:?}", readme_path);

        Ok(metadata)
    }
}
